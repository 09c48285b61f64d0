use super::{CancelCallback, Cancellation, SubscriptionId};
use crate::error::CancelledError;

/// A cancellation that is never requested.
///
/// Lets call sites always hold a [`Cancellation`] instead of branching on
/// whether one was provided.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCancellation;

impl Cancellation for NullCancellation {
    fn subscribe(&self, _callback: CancelCallback) -> SubscriptionId {
        SubscriptionId::DETACHED
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}

    fn is_requested(&self) -> bool {
        false
    }

    fn check(&self) -> Result<(), CancelledError> {
        Ok(())
    }
}
