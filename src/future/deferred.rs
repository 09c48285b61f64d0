use std::fmt;

use super::handle::is_future;
use super::state::{FutureState, SharedState};
use super::Future;
use crate::error::Error;

/// The producer side of a [`Future`]: the only handle allowed to settle it.
///
/// Settling twice is a programming error and panics. A `DeferredFuture` is
/// deliberately not `Clone`; hand out [`DeferredFuture::future`] instead.
pub struct DeferredFuture<T> {
    state: SharedState<T>,
}

impl<T> DeferredFuture<T> {
    /// Create a pending future.
    pub fn new() -> Self {
        Self {
            state: FutureState::shared(),
        }
    }

    /// A consumer handle for this future.
    pub fn future(&self) -> Future<T> {
        Future::from_state(self.state.clone())
    }

    /// Returns `true` once the future has settled.
    pub fn is_complete(&self) -> bool {
        self.state.borrow().is_complete()
    }
}

impl<T: Clone + 'static> DeferredFuture<T> {
    /// Complete the future with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the future already settled, or if `value` is itself a
    /// [`Future`]: a future is never resolved with another one.
    pub fn complete(&self, value: T) {
        assert!(
            !is_future::<T>(),
            "cannot complete a future with another future; await it first"
        );
        FutureState::settle(&self.state, Ok(value));
    }

    /// Fail the future with `err`.
    ///
    /// # Panics
    ///
    /// Panics if the future already settled.
    pub fn error(&self, err: impl Into<Error>) {
        FutureState::settle(&self.state, Err(err.into()));
    }

    pub(crate) fn settle(&self, outcome: Result<T, Error>) {
        match outcome {
            Ok(value) => self.complete(value),
            Err(err) => self.error(err),
        }
    }
}

impl<T> Default for DeferredFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DeferredFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredFuture")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn second_completion_panics_and_keeps_the_first() {
        block_on(async {
            let deferred = DeferredFuture::new();
            deferred.complete(1);
            let second = catch_unwind(AssertUnwindSafe(|| deferred.complete(2)));
            assert!(second.is_err());
            let third = catch_unwind(AssertUnwindSafe(|| deferred.error(Error::msg("late"))));
            assert!(third.is_err());
            assert_eq!(deferred.future().await.unwrap(), 1);

            let failed = DeferredFuture::<u8>::new();
            failed.error(Error::msg("first"));
            let again = catch_unwind(AssertUnwindSafe(|| failed.complete(1)));
            assert!(again.is_err());
            assert_eq!(failed.future().await.unwrap_err().to_string(), "first");
        })
    }

    #[test]
    #[should_panic(expected = "cannot complete a future with another future")]
    fn completing_with_a_future_panics() {
        let deferred = DeferredFuture::new();
        deferred.complete(Future::complete(1));
    }

    #[test]
    fn is_complete_tracks_settlement() {
        let deferred = DeferredFuture::<()>::new();
        let future = deferred.future();
        assert!(!deferred.is_complete());
        assert!(!future.is_complete());
        deferred.complete(());
        assert!(deferred.is_complete());
        assert!(future.is_complete());
    }
}
