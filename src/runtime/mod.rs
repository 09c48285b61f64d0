//! Cooperative event loop support.
//!
//! The way to use this is to call [`block_on()`], which installs a
//! [`Reactor`] for the current thread and drives the given future to
//! completion. Code running inside the loop reaches the reactor through
//! [`Reactor::current`] to queue callbacks, arrange delayed or signal
//! callbacks, and spawn background tasks.
//!
//! Everything here is single-threaded: callbacks and tasks interleave on the
//! thread that called [`block_on()`], and nothing ever runs in parallel.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod block_on;
mod reactor;

pub use block_on::block_on;
pub use reactor::{EventKey, Reactor};

pub(crate) use block_on::FlagWaker;

use std::cell::RefCell;

thread_local! {
    pub(crate) static REACTOR: RefCell<Option<Reactor>> = const { RefCell::new(None) };
}
