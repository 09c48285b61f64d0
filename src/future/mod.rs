//! Values that settle once, and combinators over many of them.
//!
//! A [`DeferredFuture`] is the producer side: it settles exactly once, with a
//! value or with an [`Error`](crate::error::Error). Any number of [`Future`]
//! handles observe that outcome, whether they subscribe before or after it
//! is settled.
//!
//! ```
//! use deferred::future::DeferredFuture;
//! use deferred::runtime::block_on;
//! use deferred::task::spawn;
//!
//! block_on(async {
//!     let deferred = DeferredFuture::new();
//!     let consumer = {
//!         let future = deferred.future();
//!         spawn(async move { future.await })
//!     };
//!     deferred.complete("meow");
//!     assert_eq!(consumer.await.unwrap(), "meow");
//! });
//! ```
//!
//! # Combinators
//!
//! The free functions of this module observe a [`FutureSet`] and reduce it to
//! one outcome. Inputs are anything iterable over [`Future`]s, keyed by their
//! position, or over `(key, Future)` pairs, as well as [`lazy`] streams of
//! either.
//!
//! | Function | Completes with |
//! | --- | --- |
//! | [`all`] | every value, in input order, or the first failure |
//! | [`settle`] / [`await_all`] | every failure and every value, in input order |
//! | [`any`] / [`await_any`] | the first value, or every failure |
//! | [`some`] / [`await_any_n`] | the first `n` values, or the failures |
//! | [`race`] / [`first`] / [`await_first`] | the first outcome, either way |
//!
//! Each combinator takes a [`Cancellation`](crate::cancellation::Cancellation).
//! Once it is requested the combinator stops waiting and fails with
//! [`Error::Cancelled`](crate::error::Error::Cancelled); the observed futures
//! themselves are left alone. [`Future::iterate`] exposes the underlying
//! completion-order iteration directly.

mod all;
mod any;
mod deferred;
mod handle;
mod iterate;
mod race;
mod set;
mod settle;
mod state;
mod wait;

pub use all::all;
pub use any::{any, any as await_any, some, some as await_any_n};
pub use deferred::DeferredFuture;
pub use handle::Future;
pub use iterate::FutureIterator;
pub use race::{race, race as first, race as await_first};
pub use set::{lazy, FutureSet, Keyed, Lazy};
#[doc(hidden)]
pub use set::Source;
pub use settle::{settle, settle as await_all, Settlement};
pub use wait::Wait;
