use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use deferred::cancellation::{NullCancellation, TimeoutCancellation};
use deferred::error::Error;
use deferred::future::{self, DeferredFuture, Future};
use deferred::runtime::Reactor;
use deferred::task::{sleep, spawn, yield_now};
use futures_lite::StreamExt;

#[deferred::test]
async fn iterate_is_a_stream_in_completion_order() -> deferred::Result<()> {
    let futures = (0..4u64).map(|i| {
        let delay = Duration::from_millis(20 - i * 5);
        (i, spawn(async move {
            sleep(delay).await;
            Ok(i)
        }))
    });
    let keys: Vec<u64> = Future::iterate(futures.collect::<Vec<_>>(), &NullCancellation)
        .map(|item| item.map(|(key, _)| key))
        .try_collect()
        .await?;
    assert_eq!(keys, vec![3, 2, 1, 0]);
    Ok(())
}

#[deferred::test]
async fn iterate_stops_at_a_timeout() -> deferred::Result<()> {
    let producer = DeferredFuture::<u8>::new();
    let stuck = DeferredFuture::<u8>::new();
    let later = producer.future();
    let feeder = spawn(async move {
        sleep(Duration::from_millis(1)).await;
        producer.complete(1);
        sleep(Duration::from_millis(50)).await;
        Ok(())
    });

    let timeout = TimeoutCancellation::new(Duration::from_millis(10));
    let mut iter = Future::iterate([later, stuck.future()], &timeout);
    let (key, future) = iter.next().await.unwrap()?;
    assert_eq!((key, future.await?), (0, 1));
    let err = iter.next().await.unwrap().unwrap_err();
    assert!(matches!(err.cause(), Some(Error::Timeout(_))));
    assert!(iter.next().await.is_none());
    feeder.await?;
    Ok(())
}

#[deferred::test]
async fn unobserved_failures_reach_the_error_handler() -> deferred::Result<()> {
    let reported = Rc::new(RefCell::new(Vec::new()));
    let sink = reported.clone();
    Reactor::current().set_error_handler(move |err| sink.borrow_mut().push(err.to_string()));

    let derived = {
        let failed = DeferredFuture::<u8>::new();
        let derived = failed.future().map(|n| Ok(n + 1));
        failed.error(Error::msg("source failed"));
        derived
    };
    yield_now().await;
    drop(derived);
    yield_now().await;
    assert_eq!(*reported.borrow(), vec!["source failed".to_string()]);

    let values = future::settle([Future::<u8>::error(Error::msg("settled"))], &NullCancellation).await?;
    assert_eq!(values.0.len(), 1);
    yield_now().await;
    assert_eq!(reported.borrow().len(), 1);
    Ok(())
}
