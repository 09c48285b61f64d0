use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{CancelCallback, Cancellation, Registry, SubscriptionId};
use crate::error::CancelledError;

/// A cancellation requested as soon as any of its sources is.
///
/// The first source to fire wins: the composite unsubscribes from every
/// source and hands that source's [`CancelledError`] to its own subscribers.
/// Dropping the composite also unsubscribes from every source.
pub struct CompositeCancellation {
    inner: Rc<Inner>,
}

struct Inner {
    registry: Registry,
    sources: RefCell<Vec<Source>>,
}

struct Source {
    cancellation: Box<dyn Cancellation>,
    subscription: Option<SubscriptionId>,
}

impl CompositeCancellation {
    /// Combine `sources` into one cancellation.
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: Cancellation + 'static,
    {
        let inner = Rc::new(Inner {
            registry: Registry::new(),
            sources: RefCell::new(Vec::new()),
        });
        for cancellation in sources {
            let weak = Rc::downgrade(&inner);
            let subscription = cancellation.subscribe(Box::new(move |reason| Inner::fire(&weak, reason)));
            inner.sources.borrow_mut().push(Source {
                cancellation: Box::new(cancellation),
                subscription: Some(subscription),
            });
        }
        Self { inner }
    }
}

impl Inner {
    fn fire(this: &Weak<Inner>, reason: CancelledError) {
        let Some(inner) = this.upgrade() else {
            return;
        };
        if inner.registry.is_requested() {
            return;
        }
        inner.detach();
        inner.registry.cancel(reason);
    }

    fn detach(&self) {
        let mut sources = self.sources.borrow_mut();
        for source in sources.iter_mut() {
            if let Some(id) = source.subscription.take() {
                source.cancellation.unsubscribe(id);
            }
        }
    }
}

impl Cancellation for CompositeCancellation {
    fn subscribe(&self, callback: CancelCallback) -> SubscriptionId {
        self.inner.registry.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.registry.unsubscribe(id)
    }

    fn is_requested(&self) -> bool {
        self.inner.registry.is_requested()
            || self
                .inner
                .sources
                .borrow()
                .iter()
                .any(|source| source.cancellation.is_requested())
    }

    fn check(&self) -> Result<(), CancelledError> {
        self.inner.registry.check()?;
        for source in self.inner.sources.borrow().iter() {
            source.cancellation.check()?;
        }
        Ok(())
    }
}

impl fmt::Debug for CompositeCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCancellation")
            .field("sources", &self.inner.sources.borrow().len())
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl Drop for CompositeCancellation {
    fn drop(&mut self) {
        self.inner.detach();
    }
}
