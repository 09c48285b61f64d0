use super::FutureSet;
use crate::cancellation::Cancellation;
use crate::error::{CompositeError, CompositeLengthError, Result};

/// Wait for the first future to complete successfully.
///
/// Failures are collected until one future succeeds. If every future fails,
/// a [`CompositeError`] holding each failure in settlement order is
/// returned.
///
/// ```
/// use deferred::cancellation::NullCancellation;
/// use deferred::error::Error;
/// use deferred::future::{self, Future};
/// use deferred::runtime::block_on;
///
/// block_on(async {
///     let futures = [Future::error(Error::msg("nope")), Future::complete(2)];
///     assert_eq!(future::any(futures, &NullCancellation).await.unwrap(), 2);
/// });
/// ```
///
/// # Errors
///
/// Fails with [`CompositeLengthError::TooFew`] when `futures` is empty.
pub async fn any<S>(futures: S, cancellation: &dyn Cancellation) -> Result<S::Value>
where
    S: FutureSet,
{
    let mut values = some(1, futures, cancellation).await?;
    match values.pop() {
        Some((_, value)) => Ok(value),
        None => unreachable!("a successful `some(1)` yields one value"),
    }
}

/// Wait for `count` futures to complete successfully.
///
/// Returns the first `count` values with their keys, in settlement order.
/// Gives up with a [`CompositeError`] of the collected failures once too
/// many futures failed for `count` successes to remain possible.
///
/// # Errors
///
/// Fails with [`CompositeLengthError::ZeroCount`] when `count` is zero and
/// with [`CompositeLengthError::TooFew`] when fewer than `count` futures are
/// supplied. Both are checked before any future is observed, except that the
/// length of a [`lazy`](super::lazy) set is only known once it ends.
pub async fn some<S>(
    count: usize,
    futures: S,
    cancellation: &dyn Cancellation,
) -> Result<Vec<(S::Key, S::Value)>>
where
    S: FutureSet,
{
    if count == 0 {
        return Err(CompositeLengthError::ZeroCount.into());
    }
    let source = futures.into_source();
    if let Some(supplied) = source.known_len().filter(|len| *len < count) {
        return Err(too_few(count, supplied));
    }

    let mut iter = source.observe(cancellation);
    let mut values = Vec::with_capacity(count);
    let mut errors = Vec::new();
    while let Some(arrival) = iter.next_arrival().await {
        let arrival = arrival?;
        match arrival.future.await {
            Ok(value) => {
                values.push((arrival.key, value));
                if values.len() == count {
                    return Ok(values);
                }
            }
            Err(err) => {
                errors.push(err);
                if iter.is_enumerated() && values.len() + iter.remaining() < count {
                    break;
                }
            }
        }
    }

    let supplied = iter.supplied();
    if supplied < count {
        return Err(too_few(count, supplied));
    }
    Err(CompositeError::new(errors).into())
}

fn too_few(required: usize, supplied: usize) -> crate::error::Error {
    CompositeLengthError::TooFew { required, supplied }.into()
}
