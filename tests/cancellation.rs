use std::time::Duration;

use deferred::cancellation::{
    Cancellation, CompositeCancellation, DeferredCancellation, SignalCancellation,
    TimeoutCancellation,
};
use deferred::error::Error;
use deferred::future::{self, DeferredFuture};
use deferred::runtime::Reactor;
use deferred::task::{sleep, spawn, yield_now};

/// Keep the loop busy for `millis`, since timeouts and signal watchers do
/// not keep it alive on their own.
fn keep_alive(millis: u64) -> deferred::Future<()> {
    spawn(async move {
        sleep(Duration::from_millis(millis)).await;
        Ok(())
    })
}

#[deferred::test]
async fn requested_cancellation_fails_every_combinator() -> deferred::Result<()> {
    let source = DeferredCancellation::new();
    source.cancel_with(Error::msg("shutting down"));
    let token = source.cancellation();
    let pending = DeferredFuture::<u8>::new();

    let err = future::all([pending.future()], &token).await.unwrap_err();
    assert!(err.is_cancelled());
    let err = future::any([pending.future()], &token).await.unwrap_err();
    assert!(err.is_cancelled());
    let err = future::race([pending.future()], &token).await.unwrap_err();
    assert!(err.is_cancelled());
    let err = future::settle([pending.future()], &token).await.unwrap_err();
    assert!(err.is_cancelled());
    let err = pending.future().wait(&token).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "the operation was cancelled: shutting down"
    );
    assert!(!pending.is_complete());
    Ok(())
}

#[deferred::test]
async fn timeout_cancels_a_wait_but_not_the_work() -> deferred::Result<()> {
    let _busy = keep_alive(100);
    let deferred = DeferredFuture::new();
    let future = deferred.future();

    let timeout = TimeoutCancellation::with_message(Duration::from_millis(5), "too slow");
    let err = future.wait(&timeout).await.unwrap_err();
    let Error::Cancelled(cancelled) = &err else {
        panic!("expected cancellation, got {err:?}");
    };
    let Some(Error::Timeout(cause)) = cancelled.cause() else {
        panic!("expected a timeout cause, got {cancelled:?}");
    };
    assert_eq!(cause.message(), "too slow");

    deferred.complete(5);
    assert_eq!(future.await?, 5);
    Ok(())
}

#[deferred::test]
async fn signal_cancels_a_wait() -> deferred::Result<()> {
    let _busy = keep_alive(100);
    let signals = SignalCancellation::new(&[2, 15]);
    let pending = DeferredFuture::<u8>::new();

    let sender = spawn(async {
        sleep(Duration::from_millis(5)).await;
        Reactor::current().deliver_signal(15);
        Ok(())
    });
    let err = pending.future().wait(&signals).await.unwrap_err();
    let Error::Cancelled(cancelled) = &err else {
        panic!("expected cancellation, got {err:?}");
    };
    let Some(Error::Signal(cause)) = cancelled.cause() else {
        panic!("expected a signal cause, got {cancelled:?}");
    };
    assert_eq!(cause.signal(), 15);
    sender.await?;
    Ok(())
}

#[deferred::test]
async fn composite_fires_once_with_the_first_cause() -> deferred::Result<()> {
    let sources: Vec<DeferredCancellation> = (0..3).map(|_| DeferredCancellation::new()).collect();
    let composite = CompositeCancellation::new(sources.iter().map(|s| s.cancellation()));
    let pending = DeferredFuture::<u8>::new();

    sources[1].cancel_with(Error::msg("second source"));
    yield_now().await;
    sources[0].cancel_with(Error::msg("first source"));
    let err = pending.future().wait(&composite).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "the operation was cancelled: second source"
    );
    assert!(composite.is_requested());
    Ok(())
}

#[deferred::test]
async fn late_cancellation_does_not_override_a_settled_future() -> deferred::Result<()> {
    let source = DeferredCancellation::new();
    let token = source.cancellation();
    let deferred = DeferredFuture::new();
    let future = deferred.future();

    deferred.complete("done");
    source.cancel();
    assert_eq!(future.wait(&token).await?, "done");
    Ok(())
}
