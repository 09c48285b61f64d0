use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{CancelCallback, Cancellation, Registry, SubscriptionId};
use crate::error::{CancelledError, SignalError};
use crate::runtime::{EventKey, Reactor};

const DEFAULT_MESSAGE: &str = "operation cancelled by signal";

/// A cancellation requested when one of a set of signals reaches the loop.
///
/// The cause is a [`SignalError`] naming the signal. The watchers do not keep
/// the event loop alive, are released once one of them fires, and are
/// released when the cancellation is dropped.
pub struct SignalCancellation {
    registry: Rc<Registry>,
    reactor: Reactor,
    watchers: Rc<RefCell<Vec<EventKey>>>,
}

impl SignalCancellation {
    /// Cancel when any of `signals` is delivered.
    ///
    /// # Panics
    ///
    /// Panics when called outside of `deferred::runtime::block_on`.
    pub fn new(signals: &[i32]) -> Self {
        Self::with_message(signals, DEFAULT_MESSAGE)
    }

    /// Cancel when any of `signals` is delivered, with a custom message.
    pub fn with_message(signals: &[i32], message: impl Into<String>) -> Self {
        let registry = Rc::new(Registry::new());
        let watchers = Rc::new(RefCell::new(Vec::with_capacity(signals.len())));
        let reactor = Reactor::current();
        let message = message.into();
        for &signal in signals {
            let registry = Rc::downgrade(&registry);
            let keys = Rc::downgrade(&watchers);
            let message = message.clone();
            let key = reactor.on_signal(signal, move |signal| {
                fire(&registry, &keys, SignalError::new(signal, message.clone()))
            });
            reactor.unreference(key);
            watchers.borrow_mut().push(key);
        }
        Self {
            registry,
            reactor,
            watchers,
        }
    }

    fn release(&self) {
        release(&self.reactor, &self.watchers);
    }
}

fn fire(registry: &Weak<Registry>, watchers: &Weak<RefCell<Vec<EventKey>>>, cause: SignalError) {
    if let Some(watchers) = watchers.upgrade() {
        release(&Reactor::current(), &watchers);
    }
    if let Some(registry) = registry.upgrade() {
        registry.cancel(CancelledError::with_cause(cause));
    }
}

fn release(reactor: &Reactor, watchers: &RefCell<Vec<EventKey>>) {
    let keys = std::mem::take(&mut *watchers.borrow_mut());
    for key in keys {
        reactor.cancel(key);
    }
}

impl Cancellation for SignalCancellation {
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

impl fmt::Debug for SignalCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalCancellation")
            .field("watchers", &self.watchers.borrow().len())
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl Drop for SignalCancellation {
    fn drop(&mut self) {
        self.release();
    }
}
