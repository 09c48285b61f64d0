use std::time::Duration;

use deferred::cancellation::NullCancellation;
use deferred::error::{CompositeLengthError, Error};
use deferred::future::{self, DeferredFuture, Future};
use deferred::task::{sleep, spawn};

fn after<T: Clone + 'static>(millis: u64, value: T) -> Future<T> {
    spawn(async move {
        sleep(Duration::from_millis(millis)).await;
        Ok(value)
    })
}

fn fail_after(millis: u64, message: &'static str) -> Future<u32> {
    spawn(async move {
        sleep(Duration::from_millis(millis)).await;
        Err(Error::msg(message))
    })
}

#[deferred::test]
async fn all_returns_values_in_input_order() -> deferred::Result<()> {
    let futures = [after(20, 1), after(5, 2), Future::complete(3)];
    let values = future::all(futures, &NullCancellation).await?;
    assert_eq!(values, vec![(0, 1), (1, 2), (2, 3)]);
    Ok(())
}

#[deferred::test]
async fn all_fails_with_the_first_failure_to_settle() -> deferred::Result<()> {
    let futures = [fail_after(20, "slow"), fail_after(5, "fast"), after(1, 3)];
    let err = future::all(futures, &NullCancellation).await.unwrap_err();
    assert_eq!(err.to_string(), "fast");
    Ok(())
}

#[deferred::test]
async fn await_all_keeps_keys() -> deferred::Result<()> {
    let futures = vec![
        ("config", after(5, 10)),
        ("cache", fail_after(1, "cold")),
        ("index", Future::complete(30)),
    ];
    let (errors, values) = future::await_all(futures, &NullCancellation).await?;
    assert_eq!(values, vec![("config", 10), ("index", 30)]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "cache");
    Ok(())
}

#[deferred::test]
async fn any_prefers_a_late_success_over_early_failures() -> deferred::Result<()> {
    let futures = [fail_after(1, "a"), fail_after(2, "b"), after(10, 7)];
    assert_eq!(future::await_any(futures, &NullCancellation).await?, 7);
    Ok(())
}

#[deferred::test]
async fn any_reports_every_failure_in_settlement_order() -> deferred::Result<()> {
    let futures = [fail_after(10, "second"), fail_after(1, "first")];
    let err = future::any(futures, &NullCancellation).await.unwrap_err();
    let Error::Composite(composite) = &err else {
        panic!("expected a composite error, got {err:?}");
    };
    let messages: Vec<String> = composite.errors().iter().map(ToString::to_string).collect();
    assert_eq!(messages, vec!["first", "second"]);
    assert!(err.to_string().contains("multiple errors encountered (2)"));
    Ok(())
}

#[deferred::test]
async fn some_returns_the_first_values_to_arrive() -> deferred::Result<()> {
    let futures = [after(30, 1), after(1, 2), after(5, 3)];
    let values = future::await_any_n(2, futures, &NullCancellation).await?;
    assert_eq!(values, vec![(1, 2), (2, 3)]);
    Ok(())
}

#[deferred::test]
async fn some_rejects_more_than_supplied() -> deferred::Result<()> {
    let futures = [Future::complete(1), Future::complete(2)];
    let err = future::some(3, futures, &NullCancellation).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Length(CompositeLengthError::TooFew {
            required: 3,
            supplied: 2
        })
    ));
    assert_eq!(
        err.to_string(),
        "2 futures supplied, but at least 3 are required"
    );
    Ok(())
}

#[deferred::test]
async fn race_returns_the_first_outcome_either_way() -> deferred::Result<()> {
    let futures = [Future::error(Error::msg("E")), Future::complete(2)];
    let err = future::first(futures, &NullCancellation).await.unwrap_err();
    assert_eq!(err.to_string(), "E");

    let futures = [after(20, "slow"), after(1, "quick")];
    assert_eq!(future::await_first(futures, &NullCancellation).await?, "quick");
    Ok(())
}

#[deferred::test]
async fn lazy_inputs_are_observed_while_enumerated() -> deferred::Result<()> {
    let producers: Vec<DeferredFuture<u32>> = (0..3).map(|_| DeferredFuture::new()).collect();
    let futures: Vec<Future<u32>> = producers.iter().map(DeferredFuture::future).collect();
    let stream = futures_lite::stream::iter(futures);

    let settle = spawn(async move {
        sleep(Duration::from_millis(5)).await;
        for (value, producer) in producers.iter().enumerate().rev() {
            producer.complete(value as u32 * 10);
        }
        Ok(())
    });

    let values = future::all(future::lazy(stream), &NullCancellation).await?;
    assert_eq!(values, vec![(0, 0), (1, 10), (2, 20)]);
    settle.await?;
    Ok(())
}
