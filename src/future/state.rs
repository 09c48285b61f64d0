use std::cell::RefCell;
use std::rc::Rc;

use slab::Slab;

use crate::error::Error;
use crate::runtime::Reactor;

/// A continuation receiving the outcome of a settled future.
pub(crate) type Continuation<T> = Box<dyn FnOnce(Result<T, Error>)>;

pub(crate) type SharedState<T> = Rc<RefCell<FutureState<T>>>;

/// The completion state shared by one producer and any number of consumers.
///
/// Settles at most once. Continuations registered before settlement are
/// scheduled on the reactor in registration order; ones registered after are
/// scheduled right away. None of them ever runs inline.
pub(crate) struct FutureState<T> {
    outcome: Option<Result<T, Error>>,
    subscribers: Slab<Subscriber<T>>,
    next_seq: u64,
    handled: bool,
}

struct Subscriber<T> {
    seq: u64,
    continuation: Continuation<T>,
}

impl<T> FutureState<T> {
    pub(crate) fn shared() -> SharedState<T> {
        Rc::new(RefCell::new(FutureState {
            outcome: None,
            subscribers: Slab::new(),
            next_seq: 0,
            handled: false,
        }))
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    /// Suppress reporting of a failure nobody observed.
    pub(crate) fn ignore(&mut self) {
        self.handled = true;
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Drop a registered continuation. Unknown ids are ignored.
    pub(crate) fn unsubscribe(state: &SharedState<T>, id: usize) {
        let removed = state.borrow_mut().subscribers.try_remove(id);
        drop(removed);
    }
}

impl<T: Clone + 'static> FutureState<T> {
    /// Move `state` from pending to `outcome` and schedule every subscriber.
    ///
    /// # Panics
    ///
    /// Panics if the state has already settled.
    pub(crate) fn settle(state: &SharedState<T>, outcome: Result<T, Error>) {
        let subscribers = {
            let mut this = state.borrow_mut();
            assert!(this.outcome.is_none(), "future has already been completed");
            this.outcome = Some(outcome.clone());
            let mut subscribers: Vec<Subscriber<T>> = this.subscribers.drain().collect();
            subscribers.sort_by_key(|subscriber| subscriber.seq);
            subscribers
        };
        if subscribers.is_empty() {
            return;
        }
        let reactor = Reactor::current();
        for subscriber in subscribers {
            let outcome = outcome.clone();
            reactor.schedule(move || (subscriber.continuation)(outcome));
        }
    }

    /// Register `continuation`. Returns `None` when the state had already
    /// settled and the continuation was scheduled right away.
    pub(crate) fn subscribe(state: &SharedState<T>, continuation: Continuation<T>) -> Option<usize> {
        let mut this = state.borrow_mut();
        this.handled = true;
        if let Some(outcome) = this.outcome.clone() {
            drop(this);
            Reactor::current().schedule(move || continuation(outcome));
            return None;
        }
        let seq = this.next_seq;
        this.next_seq += 1;
        Some(this.subscribers.insert(Subscriber { seq, continuation }))
    }

    /// The outcome, if settled. Observing marks the state handled.
    pub(crate) fn observe(&mut self) -> Option<Result<T, Error>> {
        self.handled = true;
        self.outcome.clone()
    }
}

impl<T> Drop for FutureState<T> {
    fn drop(&mut self) {
        if self.handled {
            return;
        }
        if let Some(Err(err)) = self.outcome.take() {
            match Reactor::try_current() {
                Some(reactor) => reactor.report_unhandled(err),
                None => tracing::error!(error = %err, "unhandled failure in a discarded future"),
            }
        }
    }
}
