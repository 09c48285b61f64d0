//! Cooperative cancellation.
//!
//! A [`Cancellation`] lets an operation *observe* a request to stop. It never
//! forces anything: whoever subscribes decides how to react, which usually
//! means to stop waiting and report a [`CancelledError`] while the underlying
//! work carries on.
//!
//! Sources of cancellation:
//!
//! | Type | Requested when |
//! | --- | --- |
//! | [`DeferredCancellation`] | its owner calls `cancel`, or drops it |
//! | [`TimeoutCancellation`] | a duration elapsed |
//! | [`SignalCancellation`] | one of a set of signals was delivered to the loop |
//! | [`CompositeCancellation`] | any of several other cancellations was requested |
//! | [`NullCancellation`] | never |
//!
//! ```
//! use deferred::cancellation::{Cancellation, DeferredCancellation};
//! use deferred::future::DeferredFuture;
//! use deferred::runtime::block_on;
//!
//! block_on(async {
//!     let source = DeferredCancellation::new();
//!     let token = source.cancellation();
//!     let pending = DeferredFuture::<u32>::new();
//!
//!     source.cancel();
//!     let err = pending.future().wait(&token).await.unwrap_err();
//!     assert!(err.is_cancelled());
//!     assert!(!pending.is_complete());
//! });
//! ```

mod composite;
mod deferred;
mod null;
mod registry;
mod signal;
mod timeout;

pub use composite::CompositeCancellation;
pub use deferred::{CancellationToken, DeferredCancellation};
pub use null::NullCancellation;
pub use signal::SignalCancellation;
pub use timeout::TimeoutCancellation;

pub(crate) use registry::Registry;

use std::rc::Rc;

use crate::error::CancelledError;

/// A callback run once cancellation has been requested.
pub type CancelCallback = Box<dyn FnOnce(CancelledError)>;

/// Identifies a callback registered with [`Cancellation::subscribe`].
///
/// An id is only meaningful to the cancellation that issued it. Ids carry a
/// generation, so a stale id never matches a later subscription that reuses
/// its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    index: usize,
    generation: u64,
}

impl SubscriptionId {
    /// Issued for callbacks that were scheduled right away and so can no
    /// longer be removed.
    pub(crate) const DETACHED: SubscriptionId = SubscriptionId {
        index: usize::MAX,
        generation: 0,
    };

    pub(crate) fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index
    }

    pub(crate) fn generation(self) -> u64 {
        self.generation
    }
}

/// The capability to observe a cancellation request.
pub trait Cancellation {
    /// Register `callback` to run when cancellation is requested.
    ///
    /// If cancellation was already requested the callback is scheduled right
    /// away. Either way it runs on a later turn of the event loop, never
    /// inline.
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId;

    /// Remove a callback. Unknown or already fired ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Returns `true` once cancellation has been requested.
    fn is_requested(&self) -> bool;

    /// Returns the cancellation error if cancellation has been requested.
    fn check(&self) -> Result<(), CancelledError>;
}

impl<C: Cancellation + ?Sized> Cancellation for &C {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        (**self).subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }

    fn is_requested(&self) -> bool {
        (**self).is_requested()
    }

    fn check(&self) -> Result<(), CancelledError> {
        (**self).check()
    }
}

impl<C: Cancellation + ?Sized> Cancellation for Box<C> {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        (**self).subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }

    fn is_requested(&self) -> bool {
        (**self).is_requested()
    }

    fn check(&self) -> Result<(), CancelledError> {
        (**self).check()
    }
}

impl<C: Cancellation + ?Sized> Cancellation for Rc<C> {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        (**self).subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }

    fn is_requested(&self) -> bool {
        (**self).is_requested()
    }

    fn check(&self) -> Result<(), CancelledError> {
        (**self).check()
    }
}
