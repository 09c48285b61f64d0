use super::{FlagWaker, REACTOR};
use crate::error::Error;

use core::cell::RefCell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Waker};
use slab::Slab;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

type Callback = Box<dyn FnOnce()>;
type SignalCallback = Rc<dyn Fn(i32)>;
type ErrorHandler = Rc<dyn Fn(Error)>;
type Task = Pin<Box<dyn Future<Output = ()>>>;

/// Identifies a delay or signal registration made with a [`Reactor`].
///
/// Keys carry a generation, so a key whose registration already fired or was
/// cancelled never affects a newer registration that reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    index: usize,
    generation: u64,
}

enum Watcher {
    Timer {
        deadline: Instant,
        callback: Callback,
    },
    Signal {
        signal: i32,
        callback: SignalCallback,
    },
}

struct Registration {
    generation: u64,
    referenced: bool,
    watcher: Watcher,
}

struct TaskSlot {
    future: Option<Task>,
    waker: Arc<FlagWaker>,
}

/// Drive callbacks, timers, signals and tasks for one event loop.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<InnerReactor>>,
}

/// The private, internal `Reactor` implementation - factored out so we can take
/// a lock of the whole.
struct InnerReactor {
    queue: VecDeque<Callback>,
    registrations: Slab<Registration>,
    generation: u64,
    tasks: Slab<TaskSlot>,
    error_handler: Option<ErrorHandler>,
    closed: bool,
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Reactor")
            .field("queued", &inner.queue.len())
            .field("registrations", &inner.registrations.len())
            .field("tasks", &inner.tasks.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl Reactor {
    /// Return the `Reactor` for the currently running `deferred::runtime::block_on`.
    ///
    /// # Panic
    /// This will panic if called outside of `deferred::runtime::block_on`.
    pub fn current() -> Self {
        Self::try_current().expect("Reactor::current must be called within a deferred runtime")
    }

    pub(crate) fn try_current() -> Option<Self> {
        REACTOR.with(|r| r.borrow().as_ref().cloned())
    }

    /// Create a new instance of `Reactor`
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(InnerReactor {
                queue: VecDeque::new(),
                registrations: Slab::new(),
                generation: 0,
                tasks: Slab::new(),
                error_handler: None,
                closed: false,
            })),
        }
    }

    /// Run `callback` on a later turn of the loop. Never runs it inline.
    pub fn schedule(&self, callback: impl FnOnce() + 'static) {
        self.inner.borrow_mut().queue.push_back(Box::new(callback));
    }

    /// Run `callback` once `after` has elapsed.
    ///
    /// The registration keeps the loop alive until it fires or is cancelled,
    /// unless it is marked with [`Reactor::unreference`].
    pub fn delay(&self, after: Duration, callback: impl FnOnce() + 'static) -> EventKey {
        let watcher = Watcher::Timer {
            deadline: Instant::now() + after,
            callback: Box::new(callback),
        };
        let key = self.register(watcher);
        tracing::trace!(?key, ?after, "registered delay");
        key
    }

    /// Run `callback` every time `signal` is delivered to this loop.
    ///
    /// Signals reach the loop through [`Reactor::deliver_signal`]; installing
    /// process-level signal handlers is left to the embedder.
    pub fn on_signal(&self, signal: i32, callback: impl Fn(i32) + 'static) -> EventKey {
        let watcher = Watcher::Signal {
            signal,
            callback: Rc::new(callback),
        };
        let key = self.register(watcher);
        tracing::trace!(?key, signal, "registered signal watcher");
        key
    }

    fn register(&self, watcher: Watcher) -> EventKey {
        let mut reactor = self.inner.borrow_mut();
        reactor.generation += 1;
        let generation = reactor.generation;
        let index = reactor.registrations.insert(Registration {
            generation,
            referenced: true,
            watcher,
        });
        EventKey { index, generation }
    }

    /// Cancel a registration. Cancelling a key that already fired is a no-op.
    pub fn cancel(&self, key: EventKey) {
        let removed = {
            let mut reactor = self.inner.borrow_mut();
            match reactor.registrations.get(key.index) {
                Some(registration) if registration.generation == key.generation => {
                    Some(reactor.registrations.remove(key.index))
                }
                _ => None,
            }
        };
        if removed.is_some() {
            tracing::trace!(?key, "cancelled registration");
        }
    }

    /// Stop `key` from keeping the loop alive.
    pub fn unreference(&self, key: EventKey) {
        self.set_referenced(key, false)
    }

    /// Let `key` keep the loop alive again.
    pub fn reference(&self, key: EventKey) {
        self.set_referenced(key, true)
    }

    fn set_referenced(&self, key: EventKey, referenced: bool) {
        let mut reactor = self.inner.borrow_mut();
        if let Some(registration) = reactor.registrations.get_mut(key.index) {
            if registration.generation == key.generation {
                registration.referenced = referenced;
            }
        }
    }

    /// Queue the callbacks of every watcher registered for `signal`.
    pub fn deliver_signal(&self, signal: i32) {
        let mut reactor = self.inner.borrow_mut();
        let callbacks: Vec<SignalCallback> = reactor
            .registrations
            .iter()
            .filter_map(|(_, registration)| match &registration.watcher {
                Watcher::Signal {
                    signal: watched,
                    callback,
                } if *watched == signal => Some(callback.clone()),
                _ => None,
            })
            .collect();
        tracing::debug!(signal, watchers = callbacks.len(), "delivering signal");
        for callback in callbacks {
            reactor.queue.push_back(Box::new(move || callback(signal)));
        }
    }

    /// Install the handler that receives failures nobody observed.
    ///
    /// Without a handler, an unobserved failure makes the loop panic.
    pub fn set_error_handler(&self, handler: impl Fn(Error) + 'static) {
        self.inner.borrow_mut().error_handler = Some(Rc::new(handler));
    }

    /// Forward a failure nobody observed to the error handler on a later turn.
    pub(crate) fn report_unhandled(&self, err: Error) {
        if self.inner.borrow().closed {
            tracing::error!(error = %err, "unhandled failure discarded after the event loop stopped");
            return;
        }
        let reactor = self.clone();
        self.schedule(move || {
            let handler = reactor.inner.borrow().error_handler.clone();
            match handler {
                Some(handler) => handler(err),
                None => panic!(
                    "unhandled failure in a discarded future: {err}; \
                     await the future or call `Future::ignore` before dropping it"
                ),
            }
        });
    }

    /// Start polling `future` as a background task on this loop.
    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        let mut reactor = self.inner.borrow_mut();
        let key = reactor.tasks.insert(TaskSlot {
            future: Some(Box::pin(future)),
            waker: Arc::new(FlagWaker::new(true)),
        });
        tracing::trace!(task = key, "spawned task");
    }

    /// Run one turn of the loop without blocking. Returns whether anything
    /// happened.
    pub(crate) fn turn(&self) -> bool {
        let fired = self.fire_expired(Instant::now());
        let polled = self.run_tasks();
        let ran = self.run_queue();
        fired || polled || ran
    }

    /// Block until the next timer expires.
    ///
    /// Returns `false` when nothing referenced is left that could ever make
    /// progress, which means the loop has idled out.
    pub(crate) fn block_until(&self) -> bool {
        let next = {
            let reactor = self.inner.borrow();
            if !reactor.registrations.iter().any(|(_, r)| r.referenced) {
                return false;
            }
            reactor
                .registrations
                .iter()
                .filter_map(|(_, r)| match r.watcher {
                    Watcher::Timer { deadline, .. } => Some(deadline),
                    Watcher::Signal { .. } => None,
                })
                .min()
        };
        let Some(deadline) = next else {
            return false;
        };
        let now = Instant::now();
        if deadline > now {
            tracing::debug!(wait = ?(deadline - now), "idle until next timer");
            std::thread::sleep(deadline - now);
        }
        self.fire_expired(Instant::now());
        true
    }

    fn fire_expired(&self, now: Instant) -> bool {
        let mut reactor = self.inner.borrow_mut();
        let mut expired: Vec<(Instant, usize)> = reactor
            .registrations
            .iter()
            .filter_map(|(index, r)| match r.watcher {
                Watcher::Timer { deadline, .. } if deadline <= now => Some((deadline, index)),
                _ => None,
            })
            .collect();
        if expired.is_empty() {
            return false;
        }
        expired.sort();
        for (_, index) in expired {
            if let Watcher::Timer { callback, .. } = reactor.registrations.remove(index).watcher {
                reactor.queue.push_back(callback);
            }
        }
        true
    }

    fn run_tasks(&self) -> bool {
        let ready: Vec<usize> = self
            .inner
            .borrow()
            .tasks
            .iter()
            .filter(|(_, task)| task.waker.take())
            .map(|(key, _)| key)
            .collect();
        for key in ready.iter().copied() {
            let taken = {
                let mut reactor = self.inner.borrow_mut();
                reactor.tasks.get_mut(key).and_then(|task| {
                    let waker = task.waker.clone();
                    task.future.take().map(|future| (future, waker))
                })
            };
            let Some((mut future, flag)) = taken else {
                continue;
            };
            let waker = Waker::from(flag);
            let mut cx = Context::from_waker(&waker);
            if future.as_mut().poll(&mut cx).is_ready() {
                let finished = self.inner.borrow_mut().tasks.try_remove(key);
                tracing::trace!(task = key, "task finished");
                drop(finished);
                drop(future);
            } else if let Some(task) = self.inner.borrow_mut().tasks.get_mut(key) {
                task.future = Some(future);
            }
        }
        !ready.is_empty()
    }

    fn run_queue(&self) -> bool {
        let count = self.inner.borrow().queue.len();
        for _ in 0..count {
            let callback = self.inner.borrow_mut().queue.pop_front();
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }
        count > 0
    }

    /// Drop every task, registration and queued callback. Anything dropped
    /// here runs its destructor while this reactor is still current.
    pub(crate) fn shutdown(&self) {
        let (tasks, registrations, queue) = {
            let mut reactor = self.inner.borrow_mut();
            reactor.closed = true;
            (
                std::mem::take(&mut reactor.tasks),
                std::mem::take(&mut reactor.registrations),
                std::mem::take(&mut reactor.queue),
            )
        };
        if !queue.is_empty() {
            tracing::debug!(callbacks = queue.len(), "discarding queued callbacks");
        }
        drop(tasks);
        drop(registrations);
        drop(queue);
        // Destructors above may have queued more work; it can no longer run.
        let leftover = std::mem::take(&mut self.inner.borrow_mut().queue);
        drop(leftover);
    }

    #[cfg(test)]
    pub(crate) fn task_count(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    #[cfg(test)]
    pub(crate) fn registration_count(&self) -> usize {
        self.inner.borrow().registrations.len()
    }

    #[cfg(test)]
    pub(crate) fn is_referenced(&self, key: EventKey) -> bool {
        self.inner
            .borrow()
            .registrations
            .get(key.index)
            .filter(|r| r.generation == key.generation)
            .is_some_and(|r| r.referenced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use crate::task::{sleep, yield_now};
    use std::cell::Cell;

    #[test_log::test]
    fn schedule_never_runs_inline() {
        block_on(async {
            let ran = Rc::new(Cell::new(false));
            let flag = ran.clone();
            Reactor::current().schedule(move || flag.set(true));
            assert!(!ran.get());
            yield_now().await;
            assert!(ran.get());
        })
    }

    #[test_log::test]
    fn delay_fires_and_cancel_prevents_firing() {
        block_on(async {
            let reactor = Reactor::current();
            let fired = Rc::new(Cell::new(0));
            let a = fired.clone();
            reactor.delay(Duration::from_millis(5), move || a.set(a.get() + 1));
            let b = fired.clone();
            let key = reactor.delay(Duration::from_millis(5), move || b.set(b.get() + 10));
            reactor.cancel(key);
            sleep(Duration::from_millis(20)).await;
            assert_eq!(fired.get(), 1);
            assert_eq!(reactor.registration_count(), 0);
        })
    }

    #[test_log::test]
    fn stale_key_does_not_touch_new_registration() {
        block_on(async {
            let reactor = Reactor::current();
            let old = reactor.delay(Duration::from_millis(1), || {});
            sleep(Duration::from_millis(5)).await;
            let new = reactor.delay(Duration::from_secs(60), || {});
            reactor.unreference(new);
            reactor.cancel(old);
            assert_eq!(reactor.registration_count(), 1);
            reactor.cancel(new);
            assert_eq!(reactor.registration_count(), 0);
        })
    }

    #[test_log::test]
    fn reference_flags_can_be_toggled() {
        block_on(async {
            let reactor = Reactor::current();
            let key = reactor.on_signal(15, |_| {});
            assert!(reactor.is_referenced(key));
            reactor.unreference(key);
            assert!(!reactor.is_referenced(key));
            reactor.reference(key);
            assert!(reactor.is_referenced(key));
            reactor.cancel(key);
        })
    }

    #[test_log::test]
    fn signal_watchers_fire_on_each_delivery() {
        block_on(async {
            let reactor = Reactor::current();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let log = seen.clone();
            let key = reactor.on_signal(2, move |signal| log.borrow_mut().push(signal));
            reactor.deliver_signal(2);
            reactor.deliver_signal(15);
            reactor.deliver_signal(2);
            yield_now().await;
            assert_eq!(*seen.borrow(), vec![2, 2]);
            reactor.cancel(key);
        })
    }

    #[test]
    #[should_panic(expected = "idled out")]
    fn idles_out_when_only_unreferenced_work_remains() {
        block_on(async {
            let reactor = Reactor::current();
            let key = reactor.delay(Duration::from_secs(60), || {});
            reactor.unreference(key);
            std::future::pending::<()>().await;
        })
    }

    #[test]
    #[should_panic(expected = "within a deferred runtime")]
    fn current_outside_runtime_panics() {
        Reactor::current();
    }
}
