use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Yield to the event loop for one turn.
///
/// Callbacks queued before the call get to run before the caller resumes.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Yields to the event loop once.
///
/// This `struct` is created by the [`yield_now`] function.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
