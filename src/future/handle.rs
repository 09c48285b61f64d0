use std::any::type_name;
use std::fmt;
use std::future::IntoFuture;

use super::state::{Continuation, FutureState, SharedState};
use super::{DeferredFuture, FutureIterator, FutureSet, Wait};
use crate::cancellation::Cancellation;
use crate::error::Error;

/// A read-only handle to a value that settles exactly once.
///
/// Handles are cheap to clone and every clone observes the same outcome.
/// Await a handle directly, or use [`Future::wait`] to stop waiting when a
/// [`Cancellation`] is requested. Settling is reserved to the paired
/// [`DeferredFuture`].
///
/// ```
/// use deferred::future::{DeferredFuture, Future};
/// use deferred::runtime::block_on;
///
/// block_on(async {
///     let deferred = DeferredFuture::new();
///     let doubled = deferred.future().map(|n: u32| Ok(n * 2));
///     deferred.complete(21);
///     assert_eq!(doubled.await.unwrap(), 42);
///     assert_eq!(Future::complete("ready").await.unwrap(), "ready");
/// });
/// ```
pub struct Future<T> {
    state: SharedState<T>,
}

impl<T> Future<T> {
    pub(crate) fn from_state(state: SharedState<T>) -> Self {
        Self { state }
    }

    /// Returns `true` once the future has settled.
    pub fn is_complete(&self) -> bool {
        self.state.borrow().is_complete()
    }

    /// Do not report a failure of this future if nobody observes it.
    pub fn ignore(&self) -> Self {
        self.state.borrow_mut().ignore();
        self.clone()
    }

    pub(crate) fn unsubscribe(&self, id: usize) {
        FutureState::unsubscribe(&self.state, id)
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.borrow().subscriber_count()
    }
}

impl<T: Clone + 'static> Future<T> {
    /// A future already completed with `value`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is itself a [`Future`].
    pub fn complete(value: T) -> Self {
        let deferred = DeferredFuture::new();
        deferred.complete(value);
        deferred.future()
    }

    /// A future already failed with `err`.
    pub fn error(err: impl Into<Error>) -> Self {
        let deferred = DeferredFuture::new();
        deferred.error(err);
        deferred.future()
    }

    /// Observe `futures` and yield each one as it settles.
    ///
    /// See [`FutureIterator`] for details.
    pub fn iterate<S>(futures: S, cancellation: &dyn Cancellation) -> FutureIterator<'_, S::Key, T>
    where
        S: FutureSet<Value = T>,
    {
        futures.into_source().observe(cancellation)
    }

    /// Wait for the outcome, giving up with [`Error::Cancelled`] if
    /// `cancellation` is requested first.
    ///
    /// Giving up only stops this wait: the future stays pending for every
    /// other consumer. An already settled future always wins over a
    /// cancellation.
    pub fn wait<'c>(&self, cancellation: &'c dyn Cancellation) -> Wait<'c, T> {
        Wait::new(self.clone(), Some(cancellation))
    }

    /// Derive a future by applying `f` to the value.
    ///
    /// A failure of `self` passes through untouched; an `Err` returned by `f`
    /// fails the derived future.
    pub fn map<R, F>(&self, f: F) -> Future<R>
    where
        R: Clone + 'static,
        F: FnOnce(T) -> Result<R, Error> + 'static,
    {
        let deferred = DeferredFuture::new();
        let derived = deferred.future();
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => deferred.settle(f(value)),
            Err(err) => deferred.error(err),
        }));
        derived
    }

    /// Derive a future that recovers from a failure by applying `f` to it.
    pub fn catch<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(Error) -> Result<T, Error> + 'static,
    {
        let deferred = DeferredFuture::new();
        let derived = deferred.future();
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => deferred.complete(value),
            Err(err) => deferred.settle(f(err)),
        }));
        derived
    }

    /// Derive a future that runs `f` once `self` settles either way.
    ///
    /// The derived future carries the outcome of `self`, unless `f` fails, in
    /// which case it carries that failure instead.
    pub fn finally<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce() -> Result<(), Error> + 'static,
    {
        let deferred = DeferredFuture::new();
        let derived = deferred.future();
        self.subscribe(Box::new(move |outcome| match f() {
            Ok(()) => deferred.settle(outcome),
            Err(err) => deferred.error(err),
        }));
        derived
    }

    pub(crate) fn subscribe(&self, continuation: Continuation<T>) -> Option<usize> {
        FutureState::subscribe(&self.state, continuation)
    }

    pub(crate) fn observe(&self) -> Option<Result<T, Error>> {
        self.state.borrow_mut().observe()
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl<T: Clone + 'static> IntoFuture for Future<T> {
    type Output = Result<T, Error>;
    type IntoFuture = Wait<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        Wait::new(self, None)
    }
}

impl<T: Clone + 'static> IntoFuture for &Future<T> {
    type Output = Result<T, Error>;
    type IntoFuture = Wait<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        Wait::new(self.clone(), None)
    }
}

/// Whether `T` is an instantiation of [`Future`].
///
/// Generic parameters are not comparable through `TypeId`, so this compares
/// the type path without its parameters. The output of `type_name` is not
/// guaranteed to be stable or unique, so the check is best-effort and only
/// guards `DeferredFuture::complete` against an obvious misuse.
pub(crate) fn is_future<T>() -> bool {
    fn path(name: &str) -> &str {
        name.split('<').next().unwrap_or(name)
    }
    path(type_name::<T>()) == path(type_name::<Future<()>>())
}
