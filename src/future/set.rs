use std::fmt;
use std::future::poll_fn;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_core::{ready, Stream};
use pin_project_lite::pin_project;

use super::iterate::{FutureIterator, Queue};
use super::Future;
use crate::cancellation::Cancellation;
use crate::runtime::Reactor;

/// One input of a combinator: a future and the key it is reported under.
///
/// A bare [`Future`], or a reference to one, is keyed by its position in the
/// input. A `(key, future)` pair keeps its own key.
pub trait Keyed {
    /// The key reported alongside the future's outcome.
    type Key: 'static;
    /// The value type of the future.
    type Value: Clone + 'static;

    /// Split into key and future; `index` is the position in the input.
    fn into_entry(self, index: usize) -> (Self::Key, Future<Self::Value>);
}

impl<T: Clone + 'static> Keyed for Future<T> {
    type Key = usize;
    type Value = T;

    fn into_entry(self, index: usize) -> (usize, Future<T>) {
        (index, self)
    }
}

impl<T: Clone + 'static> Keyed for &Future<T> {
    type Key = usize;
    type Value = T;

    fn into_entry(self, index: usize) -> (usize, Future<T>) {
        (index, self.clone())
    }
}

impl<K: 'static, T: Clone + 'static> Keyed for (K, Future<T>) {
    type Key = K;
    type Value = T;

    fn into_entry(self, _index: usize) -> (K, Future<T>) {
        self
    }
}

mod sealed {
    #[allow(unreachable_pub)]
    pub trait Sealed {}
}

/// A collection of futures a combinator can observe.
///
/// Implemented for every [`IntoIterator`] of [`Keyed`] items, which is
/// consumed eagerly, and for [`Lazy`] streams, which are drained in the
/// background while already settled futures are reported.
pub trait FutureSet: sealed::Sealed {
    /// The key each future is reported under.
    type Key: 'static;
    /// The value type shared by every future in the set.
    type Value: Clone + 'static;

    #[doc(hidden)]
    fn into_source(self) -> Source<Self::Key, Self::Value>;
}

impl<I> sealed::Sealed for I
where
    I: IntoIterator,
    I::Item: Keyed,
{
}

impl<I> FutureSet for I
where
    I: IntoIterator,
    I::Item: Keyed,
{
    type Key = <I::Item as Keyed>::Key;
    type Value = <I::Item as Keyed>::Value;

    fn into_source(self) -> Source<Self::Key, Self::Value> {
        let entries = self
            .into_iter()
            .enumerate()
            .map(|(index, item)| item.into_entry(index))
            .collect();
        Source {
            kind: Kind::Eager(entries),
        }
    }
}

/// Observe the futures produced by `stream` as they are produced.
///
/// The stream is drained on a background task of the current event loop, so
/// a slow producer never holds back futures that already settled. Length
/// checks of the combinators happen once the stream ends.
///
/// ```
/// use deferred::cancellation::NullCancellation;
/// use deferred::future::{self, Future};
/// use deferred::runtime::block_on;
/// use futures_lite::stream;
///
/// block_on(async {
///     let futures = stream::iter(vec![Future::complete(1), Future::complete(2)]);
///     let values = future::all(future::lazy(futures), &NullCancellation).await.unwrap();
///     assert_eq!(values, vec![(0, 1), (1, 2)]);
/// });
/// ```
pub fn lazy<S>(stream: S) -> Lazy<S>
where
    S: Stream + 'static,
    S::Item: Keyed,
{
    Lazy { stream }
}

/// A stream of futures observed while it is being produced.
///
/// This `struct` is created by the [`lazy`] function.
#[derive(Debug)]
pub struct Lazy<S> {
    stream: S,
}

impl<S> sealed::Sealed for Lazy<S> {}

impl<S> FutureSet for Lazy<S>
where
    S: Stream + 'static,
    S::Item: Keyed,
{
    type Key = <S::Item as Keyed>::Key;
    type Value = <S::Item as Keyed>::Value;

    fn into_source(self) -> Source<Self::Key, Self::Value> {
        let entries = Entries {
            stream: self.stream,
            index: 0,
        };
        Source {
            kind: Kind::Lazy(Box::pin(entries)),
        }
    }
}

pin_project! {
    /// Assigns positional keys to the items of a lazy stream.
    struct Entries<S> {
        #[pin]
        stream: S,
        index: usize,
    }
}

impl<S> Stream for Entries<S>
where
    S: Stream,
    S::Item: Keyed,
{
    type Item = (<S::Item as Keyed>::Key, Future<<S::Item as Keyed>::Value>);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.stream.poll_next(cx)) {
            Some(item) => {
                let entry = item.into_entry(*this.index);
                *this.index += 1;
                Poll::Ready(Some(entry))
            }
            None => Poll::Ready(None),
        }
    }
}

/// The futures of a [`FutureSet`], ready to be observed.
pub struct Source<K, T> {
    kind: Kind<K, T>,
}

enum Kind<K, T> {
    Eager(Vec<(K, Future<T>)>),
    Lazy(Pin<Box<dyn Stream<Item = (K, Future<T>)>>>),
}

impl<K: 'static, T: Clone + 'static> Source<K, T> {
    /// The number of futures, when known up front.
    pub(crate) fn known_len(&self) -> Option<usize> {
        match &self.kind {
            Kind::Eager(entries) => Some(entries.len()),
            Kind::Lazy(_) => None,
        }
    }

    /// Start observing every future of the set.
    pub(crate) fn observe(self, cancellation: &dyn Cancellation) -> FutureIterator<'_, K, T> {
        let iter = FutureIterator::new(cancellation);
        let queue = iter.queue().clone();
        match self.kind {
            Kind::Eager(entries) => {
                for (key, future) in entries {
                    Queue::push(&queue, key, future);
                }
                Queue::finish_enumeration(&queue);
            }
            Kind::Lazy(mut stream) => {
                let queue = Rc::downgrade(&queue);
                Reactor::current().spawn(async move {
                    poll_fn(|cx| loop {
                        let Some(queue) = queue.upgrade() else {
                            return Poll::Ready(());
                        };
                        {
                            let mut queue = queue.borrow_mut();
                            if queue.is_closed() {
                                return Poll::Ready(());
                            }
                            queue.set_enumerator(cx.waker());
                        }
                        match ready!(stream.as_mut().poll_next(cx)) {
                            Some((key, future)) => Queue::push(&queue, key, future),
                            None => {
                                Queue::finish_enumeration(&queue);
                                return Poll::Ready(());
                            }
                        }
                    })
                    .await
                });
            }
        }
        iter
    }
}

impl<K, T> fmt::Debug for Source<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Eager(entries) => f.debug_struct("Source").field("len", &entries.len()).finish(),
            Kind::Lazy(_) => f.debug_struct("Source").field("lazy", &true).finish(),
        }
    }
}
