use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use super::{CancelCallback, Cancellation, Registry, SubscriptionId};
use crate::error::{CancelledError, TimeoutError};
use crate::runtime::{EventKey, Reactor};

const DEFAULT_MESSAGE: &str = "operation timed out";

/// A cancellation requested once a duration has elapsed.
///
/// The cause is a [`TimeoutError`]. The timer does not keep the event loop
/// alive on its own, and dropping the cancellation disarms it.
pub struct TimeoutCancellation {
    registry: Rc<Registry>,
    reactor: Reactor,
    timer: EventKey,
}

impl TimeoutCancellation {
    /// Cancel after `after` has elapsed.
    ///
    /// # Panics
    ///
    /// Panics when called outside of `deferred::runtime::block_on`.
    pub fn new(after: Duration) -> Self {
        Self::with_message(after, DEFAULT_MESSAGE)
    }

    /// Cancel after `after` has elapsed, with a custom timeout message.
    pub fn with_message(after: Duration, message: impl Into<String>) -> Self {
        let registry = Rc::new(Registry::new());
        let weak = Rc::downgrade(&registry);
        let message = message.into();
        let reactor = Reactor::current();
        let timer = reactor.delay(after, move || {
            if let Some(registry) = weak.upgrade() {
                registry.cancel(CancelledError::with_cause(TimeoutError::new(message)));
            }
        });
        reactor.unreference(timer);
        Self {
            registry,
            reactor,
            timer,
        }
    }
}

impl Cancellation for TimeoutCancellation {
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

impl fmt::Debug for TimeoutCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutCancellation")
            .field("timer", &self.timer)
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl Drop for TimeoutCancellation {
    fn drop(&mut self) {
        self.reactor.cancel(self.timer);
    }
}
