use super::{Reactor, REACTOR};

use core::future::Future;
use core::pin::pin;
use core::task::Waker;
use core::task::{Context, Poll};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Wake;

/// Start the event loop and run `fut` to completion on it.
///
/// Between polls of `fut` the loop runs spawned tasks, queued callbacks and
/// expired timers, and sleeps until the next timer when there is nothing
/// else to do.
///
/// # Panics
///
/// Panics when called inside another `block_on`, and when the loop idles out:
/// `fut` is still pending but no queued callback, woken task or referenced
/// registration is left that could ever wake it.
pub fn block_on<Fut>(fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    // Construct the reactor and store a copy as a singleton to be used
    // elsewhere. The guard clears it again, even when unwinding.
    let reactor = Reactor::new();
    let prev = REACTOR.replace(Some(reactor.clone()));
    if prev.is_some() {
        REACTOR.replace(prev);
        panic!("cannot deferred::runtime::block_on inside an existing block_on!")
    }
    let _guard = Enter(reactor.clone());

    // Pin the future so it can be polled
    let mut fut = pin!(fut);

    // Create a new context to be passed to the future.
    let root = Arc::new(FlagWaker::new(true));
    let waker = Waker::from(Arc::clone(&root));
    let mut cx = Context::from_waker(&waker);

    loop {
        if root.take() {
            if let Poll::Ready(res) = fut.as_mut().poll(&mut cx) {
                return res;
            }
        }
        if reactor.turn() || root.is_awake() {
            continue;
        }
        if !reactor.block_until() {
            panic!("event loop idled out while the root future is still pending: nothing left can wake it")
        }
    }
}

struct Enter(Reactor);

impl Drop for Enter {
    fn drop(&mut self) {
        self.0.shutdown();
        REACTOR.replace(None);
    }
}

/// A waker that only records that it was woken. The loop checks the flag to
/// decide what to poll next.
pub(crate) struct FlagWaker {
    awake: AtomicBool,
}

impl FlagWaker {
    pub(crate) fn new(awake: bool) -> Self {
        Self {
            awake: AtomicBool::new(awake),
        }
    }

    /// Clear the flag, returning whether it was set.
    #[inline]
    pub(crate) fn take(&self) -> bool {
        self.awake.swap(false, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn is_awake(&self) -> bool {
        self.awake.load(Ordering::Relaxed)
    }
}

impl Wake for FlagWaker {
    fn wake(self: Arc<Self>) {
        self.awake.store(true, Ordering::Relaxed);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.awake.store(true, Ordering::Relaxed);
    }
}
