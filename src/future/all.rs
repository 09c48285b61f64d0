use super::FutureSet;
use crate::cancellation::Cancellation;
use crate::error::Result;

/// Wait for every future to complete successfully.
///
/// Values are returned with their keys in input order. The first failure to
/// settle, in settlement order, is returned as-is and the remaining futures
/// are no longer observed. An empty input completes with an empty `Vec`.
///
/// ```
/// use deferred::cancellation::NullCancellation;
/// use deferred::future::{self, Future};
/// use deferred::runtime::block_on;
///
/// block_on(async {
///     let futures = [("a", Future::complete(1)), ("b", Future::complete(2))];
///     let values = future::all(futures, &NullCancellation).await.unwrap();
///     assert_eq!(values, vec![("a", 1), ("b", 2)]);
/// });
/// ```
pub async fn all<S>(futures: S, cancellation: &dyn Cancellation) -> Result<Vec<(S::Key, S::Value)>>
where
    S: FutureSet,
{
    let mut iter = futures.into_source().observe(cancellation);
    let mut values = Vec::new();
    while let Some(arrival) = iter.next_arrival().await {
        let arrival = arrival?;
        let value = arrival.future.await?;
        values.push((arrival.ordinal, arrival.key, value));
    }
    values.sort_by_key(|(ordinal, ..)| *ordinal);
    Ok(values.into_iter().map(|(_, key, value)| (key, value)).collect())
}
