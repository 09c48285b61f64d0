use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::runtime::{EventKey, Reactor};

/// Sleeps for the specified amount of time.
///
/// The timer is registered with the reactor on first poll and keeps the loop
/// alive until it fires. Dropping the future cancels the timer.
pub fn sleep(dur: Duration) -> Sleep {
    Sleep {
        dur,
        timer: None,
        completed: false,
    }
}

/// Sleeps for the specified amount of time.
///
/// This `struct` is created by the [`sleep`] function. See its documentation
/// for more.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub struct Sleep {
    dur: Duration,
    timer: Option<(EventKey, Rc<Wakeup>)>,
    completed: bool,
}

#[derive(Debug, Default)]
struct Wakeup {
    fired: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl Wakeup {
    fn fire(this: &Weak<Wakeup>) {
        if let Some(wakeup) = this.upgrade() {
            wakeup.fired.set(true);
            if let Some(waker) = wakeup.waker.take() {
                waker.wake();
            }
        }
    }
}

impl Future for Sleep {
    type Output = Instant;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        assert!(!self.completed, "future polled after completing");
        let dur = self.dur;
        let (_, wakeup) = self.timer.get_or_insert_with(|| {
            let wakeup = Rc::new(Wakeup::default());
            let weak = Rc::downgrade(&wakeup);
            let key = Reactor::current().delay(dur, move || Wakeup::fire(&weak));
            (key, wakeup)
        });
        if wakeup.fired.get() {
            self.completed = true;
            Poll::Ready(Instant::now())
        } else {
            *wakeup.waker.borrow_mut() = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some((key, wakeup)) = &self.timer {
            if !wakeup.fired.get() {
                if let Some(reactor) = Reactor::try_current() {
                    reactor.cancel(*key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;

    #[test]
    fn sleeps_at_least_the_duration() {
        block_on(async {
            let start = Instant::now();
            let woke = sleep(Duration::from_millis(10)).await;
            assert!(woke - start >= Duration::from_millis(10));
        })
    }

    #[test]
    fn dropping_a_sleep_cancels_its_timer() {
        block_on(async {
            let mut pending = Box::pin(sleep(Duration::from_secs(60)));
            assert!(futures_lite::future::poll_once(&mut pending).await.is_none());
            assert_eq!(Reactor::current().registration_count(), 1);
            drop(pending);
            assert_eq!(Reactor::current().registration_count(), 0);
        })
    }
}
