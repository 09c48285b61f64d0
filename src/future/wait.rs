use std::cell::RefCell;
use std::future::Future as StdFuture;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use super::Future;
use crate::cancellation::{Cancellation, SubscriptionId};
use crate::error::Error;

/// Waits for a [`Future`] to settle.
///
/// This `struct` is created by [`Future::wait`] and by awaiting a [`Future`]
/// directly. See their documentation for more.
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct Wait<'c, T> {
    future: Future<T>,
    cancellation: Option<&'c dyn Cancellation>,
    slot: Rc<RefCell<Slot<T>>>,
    subscription: Option<usize>,
    cancel_subscription: Option<SubscriptionId>,
    state: State,
}

/// The internal state
#[derive(Debug)]
enum State {
    Started,
    Waiting,
    Completed,
}

/// Where the continuations drop the outcome. The first outcome wins.
struct Slot<T> {
    outcome: Option<Result<T, Error>>,
    waker: Option<Waker>,
}

impl<T> Slot<T> {
    fn fill(this: &Weak<RefCell<Slot<T>>>, outcome: Result<T, Error>) {
        let Some(slot) = this.upgrade() else {
            return;
        };
        let mut slot = slot.borrow_mut();
        if slot.outcome.is_none() {
            slot.outcome = Some(outcome);
            if let Some(waker) = slot.waker.take() {
                waker.wake();
            }
        }
    }
}

impl<'c, T> Wait<'c, T> {
    pub(super) fn new(future: Future<T>, cancellation: Option<&'c dyn Cancellation>) -> Self {
        Self {
            future,
            cancellation,
            slot: Rc::new(RefCell::new(Slot {
                outcome: None,
                waker: None,
            })),
            subscription: None,
            cancel_subscription: None,
            state: State::Started,
        }
    }
}

impl<T: Clone + 'static> Wait<'_, T> {
    fn subscribe(&mut self) {
        let slot = Rc::downgrade(&self.slot);
        self.subscription = self
            .future
            .subscribe(Box::new(move |outcome| Slot::fill(&slot, outcome)));
        if let Some(cancellation) = self.cancellation {
            let slot = Rc::downgrade(&self.slot);
            self.cancel_subscription = Some(cancellation.subscribe(Box::new(move |err| {
                Slot::fill(&slot, Err(err.into()))
            })));
        }
    }

    fn finish(&mut self, outcome: Result<T, Error>) -> Poll<Result<T, Error>> {
        self.state = State::Completed;
        self.release();
        Poll::Ready(outcome)
    }
}

impl<T> Wait<'_, T> {
    fn release(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.future.unsubscribe(id);
        }
        if let (Some(cancellation), Some(id)) = (self.cancellation, self.cancel_subscription.take()) {
            cancellation.unsubscribe(id);
        }
    }
}

impl<T: Clone + 'static> StdFuture for Wait<'_, T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.state {
            State::Started => {
                if let Some(outcome) = this.future.observe() {
                    return this.finish(outcome);
                }
                if let Some(Err(err)) = this.cancellation.map(|c| c.check()) {
                    return this.finish(Err(err.into()));
                }
                this.subscribe();
                this.state = State::Waiting;
            }
            State::Waiting => {}
            State::Completed => panic!("future polled after completing"),
        }

        let outcome = this.slot.borrow_mut().outcome.take();
        match outcome {
            // A late cancellation never overrides a settled future.
            Some(Err(Error::Cancelled(err))) => match this.future.observe() {
                Some(settled) => this.finish(settled),
                None => this.finish(Err(Error::Cancelled(err))),
            },
            Some(outcome) => this.finish(outcome),
            None => {
                this.slot.borrow_mut().waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for Wait<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for Wait<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wait")
            .field("future", &self.future)
            .field("state", &self.state)
            .finish()
    }
}
