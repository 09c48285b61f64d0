use std::fmt;
use std::rc::Rc;

use super::{CancelCallback, Cancellation, Registry, SubscriptionId};
use crate::error::{CancelledError, Error};

/// A cancellation source.
///
/// The owner holds the exclusive right to [`cancel`](Self::cancel), and hands
/// out read-only [`CancellationToken`]s to the operations that should observe
/// it. Dropping the source cancels it, so tokens tied to its lifetime are
/// never left pending.
pub struct DeferredCancellation {
    registry: Rc<Registry>,
}

impl DeferredCancellation {
    /// Create a source that has not been cancelled.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(Registry::new()),
        }
    }

    /// A token observing this source.
    pub fn cancellation(&self) -> CancellationToken {
        CancellationToken {
            registry: self.registry.clone(),
        }
    }

    /// Request cancellation without a specific cause.
    ///
    /// Only the first call has an effect.
    pub fn cancel(&self) {
        self.registry.cancel(CancelledError::new());
    }

    /// Request cancellation, recording `cause` as the reason.
    ///
    /// Only the first call has an effect; its cause is the one every
    /// subscriber sees.
    pub fn cancel_with(&self, cause: impl Into<Error>) {
        self.registry.cancel(CancelledError::with_cause(cause));
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.registry.is_requested()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }
}

impl Default for DeferredCancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeferredCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for DeferredCancellation {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// The read-only view of a [`DeferredCancellation`].
#[derive(Clone)]
pub struct CancellationToken {
    registry: Rc<Registry>,
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl Cancellation for CancellationToken {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        self.registry.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.unsubscribe(id)
    }

    fn is_requested(&self) -> bool {
        self.registry.is_requested()
    }

    fn check(&self) -> Result<(), CancelledError> {
        self.registry.check()
    }
}
