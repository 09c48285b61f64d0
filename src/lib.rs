#![allow(async_fn_in_trait)]
#![warn(future_incompatible, unreachable_pub)]
#![deny(missing_debug_implementations)]
#![warn(missing_docs)]

//! Single-threaded futures, cancellation and combinators
//!
//! This library provides a value that settles exactly once
//! ([`future::DeferredFuture`] and its read handle [`future::Future`]), a
//! cooperative way to stop waiting for one ([`cancellation`]), and
//! combinators that turn many in-flight futures into one outcome
//! ([`future::all`], [`future::any`], [`future::race`] and friends). A small
//! event loop in [`runtime`] drives it all on the current thread.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//!
//! use deferred::cancellation::TimeoutCancellation;
//! use deferred::future::{self, DeferredFuture, Future};
//! use deferred::task::{sleep, spawn};
//!
//! #[deferred::main]
//! async fn main() {
//!     let slow = DeferredFuture::<&str>::new();
//!     let fast = spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         Ok("fast")
//!     });
//!
//!     // Stop waiting after a second, whatever happens to `slow`.
//!     let timeout = TimeoutCancellation::new(Duration::from_secs(1));
//!     let winner = future::any([slow.future(), fast], &timeout).await.unwrap();
//!     assert_eq!(winner, "fast");
//!
//!     let ready = Future::complete(3).map(|n| Ok(n * 2));
//!     assert_eq!(ready.await.unwrap(), 6);
//! }
//! ```
//!
//! # Design Decisions
//!
//! Everything runs on one thread. Futures, cancellations and the reactor use
//! `Rc` and `RefCell`, none of them are `Send`, and callbacks never run in
//! parallel. That keeps the completion state simple: a future can only be
//! settled by the one [`future::DeferredFuture`] that owns it, and no locks
//! are needed to hand the outcome to its consumers.
//!
//! Callbacks never run inline. Settling a future or requesting a
//! cancellation schedules the interested parties on the event loop, so code
//! that settles something never re-enters code that is waiting on it.
//!
//! Cancellation only ever stops a *wait*. The work behind a future carries
//! on and may still settle it for other consumers.

pub mod cancellation;
pub mod error;
pub mod future;
pub mod iter;
pub mod runtime;
pub mod task;

pub use error::{Error, Result};
pub use future::{DeferredFuture, Future};

#[cfg(feature = "macros")]
pub use deferred_macro::attr_macro_main as main;
#[cfg(feature = "macros")]
pub use deferred_macro::attr_macro_test as test;

/// Commonly used traits.
pub mod prelude {
    pub use crate::cancellation::Cancellation as _;
    pub use crate::future::FutureSet as _;
    pub use crate::iter::AsyncIterator as _;
}
