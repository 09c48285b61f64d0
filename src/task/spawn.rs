use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::ready;
use pin_project_lite::pin_project;

use crate::error::Error;
use crate::future::{self, DeferredFuture};
use crate::runtime::Reactor;

/// Run `task` in the background of the current event loop.
///
/// The outcome of `task` settles the returned future: `Ok` completes it and
/// `Err` fails it. The task runs whether or not anyone awaits the returned
/// future.
///
/// # Panics
///
/// Panics when called outside of `deferred::runtime::block_on`.
pub fn spawn<F, T>(task: F) -> future::Future<T>
where
    F: Future<Output = Result<T, Error>> + 'static,
    T: Clone + 'static,
{
    let deferred = DeferredFuture::new();
    let future = deferred.future();
    Reactor::current().spawn(Spawned {
        task,
        deferred: Some(deferred),
    });
    future
}

pin_project! {
    /// Drives a spawned computation and settles its future with the outcome.
    struct Spawned<F, T> {
        #[pin]
        task: F,
        deferred: Option<DeferredFuture<T>>,
    }
}

impl<F, T> Future for Spawned<F, T>
where
    F: Future<Output = Result<T, Error>>,
    T: Clone + 'static,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let outcome = ready!(this.task.poll(cx));
        if let Some(deferred) = this.deferred.take() {
            match outcome {
                Ok(value) => deferred.complete(value),
                Err(err) => deferred.error(err),
            }
        }
        Poll::Ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block_on;
    use crate::task::yield_now;

    #[test]
    fn spawned_failure_fails_the_future() {
        block_on(async {
            let task = spawn(async {
                yield_now().await;
                Err::<u8, _>(Error::msg("nope"))
            });
            let err = task.await.unwrap_err();
            assert_eq!(err.to_string(), "nope");
        })
    }

    #[test]
    fn spawned_tasks_interleave() {
        block_on(async {
            let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
            let a = {
                let log = log.clone();
                spawn(async move {
                    log.borrow_mut().push("a1");
                    yield_now().await;
                    log.borrow_mut().push("a2");
                    Ok(())
                })
            };
            let b = {
                let log = log.clone();
                spawn(async move {
                    log.borrow_mut().push("b1");
                    yield_now().await;
                    log.borrow_mut().push("b2");
                    Ok(())
                })
            };
            a.await.unwrap();
            b.await.unwrap();
            assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
        })
    }
}
