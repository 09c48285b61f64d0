use super::FutureSet;
use crate::cancellation::Cancellation;
use crate::error::{Error, Result};

/// The failures and the values of a settled set of futures, each with its
/// key and in input order.
pub type Settlement<K, T> = (Vec<(K, Error)>, Vec<(K, T)>);

/// Wait for every future to settle, without failing on their failures.
///
/// The only error this returns is [`Error::Cancelled`].
///
/// ```
/// use deferred::cancellation::NullCancellation;
/// use deferred::error::Error;
/// use deferred::future::{self, Future};
/// use deferred::runtime::block_on;
///
/// block_on(async {
///     let futures = [Future::complete(1), Future::error(Error::msg("no")), Future::complete(3)];
///     let (errors, values) = future::settle(futures, &NullCancellation).await.unwrap();
///     assert_eq!(values, vec![(0, 1), (2, 3)]);
///     assert_eq!(errors[0].0, 1);
/// });
/// ```
pub async fn settle<S>(futures: S, cancellation: &dyn Cancellation) -> Result<Settlement<S::Key, S::Value>>
where
    S: FutureSet,
{
    let mut iter = futures.into_source().observe(cancellation);
    let mut outcomes = Vec::new();
    while let Some(arrival) = iter.next_arrival().await {
        let arrival = arrival?;
        let outcome = arrival.future.await;
        outcomes.push((arrival.ordinal, arrival.key, outcome));
    }
    outcomes.sort_by_key(|(ordinal, ..)| *ordinal);

    let mut errors = Vec::new();
    let mut values = Vec::new();
    for (_, key, outcome) in outcomes {
        match outcome {
            Ok(value) => values.push((key, value)),
            Err(err) => errors.push((key, err)),
        }
    }
    Ok((errors, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::{DeferredCancellation, NullCancellation};
    use crate::future::{DeferredFuture, Future};
    use crate::runtime::block_on;
    use crate::task::{sleep, spawn};
    use std::time::Duration;

    #[test]
    fn splits_failures_from_values() {
        block_on(async {
            let late = DeferredFuture::new();
            let future = late.future();
            let producer = spawn(async move {
                sleep(Duration::from_millis(5)).await;
                late.error(Error::msg("late"));
                Ok(())
            });
            let futures = [("late", future), ("now", Future::complete(1))];
            let (errors, values) = settle(futures, &NullCancellation).await.unwrap();
            assert_eq!(values, vec![("now", 1)]);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].0, "late");
            assert_eq!(errors[0].1.to_string(), "late");
            producer.await.unwrap();
        })
    }

    #[test]
    fn cancellation_is_the_only_error() {
        block_on(async {
            let source = DeferredCancellation::new();
            let token = source.cancellation();
            let pending = DeferredFuture::<u8>::new();
            let canceller = spawn(async move {
                sleep(Duration::from_millis(5)).await;
                source.cancel();
                Ok(())
            });
            let err = settle([pending.future()], &token).await.unwrap_err();
            assert!(err.is_cancelled());
            canceller.await.unwrap();
        })
    }

    #[test]
    fn futures_settled_before_cancellation_is_delivered_still_count() {
        block_on(async {
            let source = DeferredCancellation::new();
            let token = source.cancellation();
            let deferred = DeferredFuture::new();
            let future = deferred.future();
            let producer = spawn(async move {
                sleep(Duration::from_millis(1)).await;
                source.cancel();
                deferred.complete(1);
                Ok(())
            });
            let (errors, values) = settle([future], &token).await.unwrap();
            assert!(errors.is_empty());
            assert_eq!(values, vec![(0, 1)]);
            producer.await.unwrap();
        })
    }
}
