use std::cell::RefCell;

use slab::Slab;

use super::{CancelCallback, Cancellation, SubscriptionId};
use crate::error::CancelledError;
use crate::runtime::Reactor;

/// The subscriber registry behind every cancellation source: one terminal
/// transition, then every subscriber is scheduled with the same error.
#[derive(Default)]
pub(crate) struct Registry {
    inner: RefCell<Inner>,
}

#[derive(Default)]
struct Inner {
    reason: Option<CancelledError>,
    callbacks: Slab<Subscriber>,
    generation: u64,
}

struct Subscriber {
    generation: u64,
    callback: CancelCallback,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request cancellation with `reason`. Only the first request counts;
    /// returns whether this call was it.
    pub(crate) fn cancel(&self, reason: CancelledError) -> bool {
        let callbacks: Vec<CancelCallback> = {
            let mut inner = self.inner.borrow_mut();
            if inner.reason.is_some() {
                return false;
            }
            inner.reason = Some(reason.clone());
            inner.callbacks.drain().map(|s| s.callback).collect()
        };
        tracing::debug!(subscribers = callbacks.len(), %reason, "cancellation requested");
        if callbacks.is_empty() {
            return true;
        }
        match Reactor::try_current() {
            Some(reactor) => {
                for callback in callbacks {
                    let reason = reason.clone();
                    reactor.schedule(move || callback(reason));
                }
            }
            None => tracing::warn!(
                subscribers = callbacks.len(),
                "no event loop is running; discarding cancellation callbacks"
            ),
        }
        true
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }
}

impl Cancellation for Registry {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        match inner.reason.clone() {
            Some(reason) => {
                drop(inner);
                Reactor::current().schedule(move || callback(reason));
                SubscriptionId::DETACHED
            }
            None => {
                inner.generation += 1;
                let generation = inner.generation;
                let index = inner.callbacks.insert(Subscriber {
                    generation,
                    callback,
                });
                SubscriptionId::new(index, generation)
            }
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let current = inner
                .callbacks
                .get(id.index())
                .is_some_and(|s| s.generation == id.generation());
            current.then(|| inner.callbacks.remove(id.index()))
        };
        drop(removed);
    }

    fn is_requested(&self) -> bool {
        self.inner.borrow().reason.is_some()
    }

    fn check(&self) -> Result<(), CancelledError> {
        match &self.inner.borrow().reason {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}
