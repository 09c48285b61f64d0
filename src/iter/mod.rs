//! Composable async iteration.
//!
//! [`FutureIterator`](crate::future::FutureIterator) implements both this
//! trait and `futures_core::Stream`, so it can be driven with a plain
//! `while let Some(item) = iter.next().await` loop or with any stream
//! adapter.

/// A trait for dealing with async iterators.
pub trait AsyncIterator {
    /// The type of the elements being iterated over.
    type Item;

    /// Advances the iterator and returns the next value.
    ///
    /// Returns `None` once the iterator is exhausted, and keeps returning
    /// `None` after that.
    async fn next(&mut self) -> Option<Self::Item>;
}
