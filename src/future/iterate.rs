use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use futures_core::Stream;
use slab::Slab;

use super::Future;
use crate::cancellation::{Cancellation, SubscriptionId};
use crate::error::CancelledError;
use crate::iter::AsyncIterator;

/// Yields observed futures in the order they settle.
///
/// Created by [`Future::iterate`]. Every item is a `(key, future)` pair whose
/// future has already settled, so awaiting it never suspends. Once the
/// cancellation passed to [`Future::iterate`] is requested, the futures that
/// settled before it are still yielded, followed by one
/// [`CancelledError`], after which the iterator is exhausted.
///
/// Dropping the iterator stops observing every future that has not settled.
///
/// ```
/// use deferred::cancellation::NullCancellation;
/// use deferred::future::{DeferredFuture, Future};
/// use deferred::iter::AsyncIterator;
/// use deferred::runtime::block_on;
///
/// block_on(async {
///     let slow = DeferredFuture::new();
///     let futures = [("slow", slow.future()), ("fast", Future::complete(1))];
///     let mut iter = Future::iterate(futures, &NullCancellation);
///
///     let (key, future) = iter.next().await.unwrap().unwrap();
///     assert_eq!((key, future.await.unwrap()), ("fast", 1));
///
///     slow.complete(2);
///     let (key, _) = iter.next().await.unwrap().unwrap();
///     assert_eq!(key, "slow");
///     assert!(iter.next().await.is_none());
/// });
/// ```
#[must_use = "iterators do nothing unless polled"]
pub struct FutureIterator<'c, K, T> {
    queue: Rc<RefCell<Queue<K, T>>>,
    cancellation: &'c dyn Cancellation,
    cancel_subscription: Option<SubscriptionId>,
}

/// A settled future together with its key and its position in the input.
pub(crate) struct Arrival<K, T> {
    pub(crate) ordinal: usize,
    pub(crate) key: K,
    pub(crate) future: Future<T>,
}

struct Outstanding<K, T> {
    ordinal: usize,
    key: K,
    future: Future<T>,
    subscription: Option<usize>,
}

pub(crate) struct Queue<K, T> {
    settled: VecDeque<Arrival<K, T>>,
    outstanding: Slab<Outstanding<K, T>>,
    supplied: usize,
    enumerating: bool,
    cancelled: Option<CancelledError>,
    done: bool,
    waker: Option<Waker>,
    enumerator: Option<Waker>,
}

impl<K: 'static, T: Clone + 'static> Queue<K, T> {
    /// Start observing `future`. Ignored once the iterator was cancelled.
    pub(crate) fn push(queue: &Rc<RefCell<Self>>, key: K, future: Future<T>) {
        let (slot, ordinal) = {
            let mut this = queue.borrow_mut();
            if this.cancelled.is_some() || this.done {
                return;
            }
            let ordinal = this.supplied;
            this.supplied += 1;
            let slot = this.outstanding.insert(Outstanding {
                ordinal,
                key,
                future: future.clone(),
                subscription: None,
            });
            (slot, ordinal)
        };
        let weak = Rc::downgrade(queue);
        let subscription = future.subscribe(Box::new(move |_| Self::arrive(&weak, slot, ordinal)));
        if let Some(entry) = queue.borrow_mut().outstanding.get_mut(slot) {
            entry.subscription = subscription;
        }
    }

    fn arrive(queue: &Weak<RefCell<Self>>, slot: usize, ordinal: usize) {
        let Some(queue) = queue.upgrade() else {
            return;
        };
        let mut this = queue.borrow_mut();
        if !matches!(this.outstanding.get(slot), Some(entry) if entry.ordinal == ordinal) {
            return;
        }
        let entry = this.outstanding.remove(slot);
        this.settled.push_back(Arrival {
            ordinal,
            key: entry.key,
            future: entry.future,
        });
        this.wake();
    }
}

impl<K, T> Queue<K, T> {
    fn new() -> Self {
        Self {
            settled: VecDeque::new(),
            outstanding: Slab::new(),
            supplied: 0,
            enumerating: true,
            cancelled: None,
            done: false,
            waker: None,
            enumerator: None,
        }
    }

    /// No more futures will be pushed.
    pub(crate) fn finish_enumeration(queue: &Rc<RefCell<Self>>) {
        let mut this = queue.borrow_mut();
        this.enumerating = false;
        tracing::trace!(supplied = this.supplied, "finished enumerating futures");
        this.wake();
    }

    /// Whether enumeration should stop feeding this queue.
    pub(crate) fn is_closed(&self) -> bool {
        self.cancelled.is_some() || self.done
    }

    /// Remember the task feeding this queue so closing the queue can wake it.
    pub(crate) fn set_enumerator(&mut self, waker: &Waker) {
        self.enumerator = Some(waker.clone());
    }

    fn cancel(queue: &Weak<RefCell<Self>>, reason: CancelledError) {
        let Some(queue) = queue.upgrade() else {
            return;
        };
        let outstanding = {
            let mut this = queue.borrow_mut();
            if this.cancelled.is_some() || this.done {
                return;
            }
            // Futures that settled before the cancellation still count, even
            // if their arrival has not been delivered yet.
            let slots: Vec<usize> = this
                .outstanding
                .iter()
                .filter(|(_, entry)| entry.future.is_complete())
                .map(|(slot, _)| slot)
                .collect();
            let mut settled: Vec<Outstanding<K, T>> =
                slots.into_iter().map(|slot| this.outstanding.remove(slot)).collect();
            settled.sort_by_key(|entry| entry.ordinal);
            for entry in settled {
                if let Some(id) = entry.subscription {
                    entry.future.unsubscribe(id);
                }
                this.settled.push_back(Arrival {
                    ordinal: entry.ordinal,
                    key: entry.key,
                    future: entry.future,
                });
            }
            if this.outstanding.is_empty() && !this.enumerating {
                this.wake();
                return;
            }
            tracing::debug!(
                outstanding = this.outstanding.len(),
                "stopped observing futures after cancellation"
            );
            this.cancelled = Some(reason);
            this.wake();
            this.wake_enumerator();
            std::mem::take(&mut this.outstanding)
        };
        release(outstanding);
    }

    fn wake_enumerator(&mut self) {
        if let Some(waker) = self.enumerator.take() {
            waker.wake();
        }
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

fn release<K, T>(outstanding: Slab<Outstanding<K, T>>) {
    for (_, entry) in outstanding {
        if let Some(id) = entry.subscription {
            entry.future.unsubscribe(id);
        }
    }
}

impl<'c, K: 'static, T: Clone + 'static> FutureIterator<'c, K, T> {
    pub(crate) fn new(cancellation: &'c dyn Cancellation) -> Self {
        let queue = Rc::new(RefCell::new(Queue::new()));
        let cancel_subscription = match cancellation.check() {
            Err(reason) => {
                queue.borrow_mut().cancelled = Some(reason);
                None
            }
            Ok(()) => {
                let weak = Rc::downgrade(&queue);
                Some(cancellation.subscribe(Box::new(move |reason| Queue::cancel(&weak, reason))))
            }
        };
        Self {
            queue,
            cancellation,
            cancel_subscription,
        }
    }
}

impl<K, T> FutureIterator<'_, K, T> {
    pub(crate) fn queue(&self) -> &Rc<RefCell<Queue<K, T>>> {
        &self.queue
    }

    /// How many futures have been supplied so far.
    pub(crate) fn supplied(&self) -> usize {
        self.queue.borrow().supplied
    }

    /// How many supplied futures have not been yielded yet.
    pub(crate) fn remaining(&self) -> usize {
        let queue = self.queue.borrow();
        queue.outstanding.len() + queue.settled.len()
    }

    /// Whether every future has been supplied.
    pub(crate) fn is_enumerated(&self) -> bool {
        !self.queue.borrow().enumerating
    }

    /// Wait for the next settled future.
    pub(crate) async fn next_arrival(&mut self) -> Option<Result<Arrival<K, T>, CancelledError>> {
        poll_fn(|cx| self.poll_arrival(cx)).await
    }

    fn poll_arrival(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Arrival<K, T>, CancelledError>>> {
        let mut queue = self.queue.borrow_mut();
        if let Some(arrival) = queue.settled.pop_front() {
            return Poll::Ready(Some(Ok(arrival)));
        }
        if queue.done {
            return Poll::Ready(None);
        }
        if let Some(reason) = queue.cancelled.clone() {
            drop(queue);
            self.dispose();
            return Poll::Ready(Some(Err(reason)));
        }
        if queue.outstanding.is_empty() && !queue.enumerating {
            drop(queue);
            self.dispose();
            return Poll::Ready(None);
        }
        queue.waker = Some(cx.waker().clone());
        Poll::Pending
    }

    /// Stop observing everything. Settled but unyielded futures are dropped.
    fn dispose(&mut self) {
        if let Some(id) = self.cancel_subscription.take() {
            self.cancellation.unsubscribe(id);
        }
        let (outstanding, settled) = {
            let mut queue = self.queue.borrow_mut();
            queue.done = true;
            queue.waker = None;
            queue.wake_enumerator();
            (
                std::mem::take(&mut queue.outstanding),
                std::mem::take(&mut queue.settled),
            )
        };
        release(outstanding);
        drop(settled);
    }
}

impl<K, T> Stream for FutureIterator<'_, K, T> {
    type Item = Result<(K, Future<T>), CancelledError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .poll_arrival(cx)
            .map(|item| item.map(|arrival| arrival.map(|a| (a.key, a.future))))
    }
}

impl<K, T> AsyncIterator for FutureIterator<'_, K, T> {
    type Item = Result<(K, Future<T>), CancelledError>;

    async fn next(&mut self) -> Option<Self::Item> {
        poll_fn(|cx| self.poll_arrival(cx))
            .await
            .map(|item| item.map(|arrival| (arrival.key, arrival.future)))
    }
}

impl<K, T> Drop for FutureIterator<'_, K, T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<K, T> fmt::Debug for FutureIterator<'_, K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("FutureIterator")
            .field("supplied", &queue.supplied)
            .field("settled", &queue.settled.len())
            .field("outstanding", &queue.outstanding.len())
            .field("cancelled", &queue.cancelled.is_some())
            .finish()
    }
}
