use super::FutureSet;
use crate::cancellation::Cancellation;
use crate::error::{CompositeLengthError, Result};

/// Wait for the first future to settle, successfully or not.
///
/// When several futures have already settled, the one supplied first wins.
/// A failure is returned as-is.
///
/// # Errors
///
/// Fails with [`CompositeLengthError::TooFew`] when `futures` is empty.
pub async fn race<S>(futures: S, cancellation: &dyn Cancellation) -> Result<S::Value>
where
    S: FutureSet,
{
    let empty = || CompositeLengthError::TooFew {
        required: 1,
        supplied: 0,
    };
    let source = futures.into_source();
    if source.known_len() == Some(0) {
        return Err(empty().into());
    }
    let mut iter = source.observe(cancellation);
    match iter.next_arrival().await {
        Some(arrival) => arrival?.future.await,
        None => Err(empty().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::{NullCancellation, TimeoutCancellation};
    use crate::error::Error;
    use crate::future::{DeferredFuture, Future};
    use crate::runtime::block_on;
    use crate::task::{sleep, spawn};
    use std::time::Duration;

    #[test]
    fn first_settled_failure_is_returned_as_is() {
        block_on(async {
            let futures = [Future::error(Error::msg("E")), Future::complete(2)];
            let err = race(futures, &NullCancellation).await.unwrap_err();
            assert_eq!(err.to_string(), "E");
        })
    }

    #[test]
    fn first_settled_value_wins() {
        block_on(async {
            let pending = DeferredFuture::<u8>::new();
            let futures = [("pending", pending.future()), ("ready", Future::complete(2))];
            assert_eq!(race(futures, &NullCancellation).await.unwrap(), 2);
        })
    }

    #[test]
    fn rejects_empty_input() {
        block_on(async {
            let err = race(Vec::<Future<u8>>::new(), &NullCancellation).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Length(CompositeLengthError::TooFew {
                    required: 1,
                    supplied: 0
                })
            ));
        })
    }

    #[test]
    fn timeout_stops_waiting() {
        block_on(async {
            let pending = DeferredFuture::<u8>::new();
            let future = pending.future();
            let timeout = TimeoutCancellation::new(Duration::from_millis(5));
            // The timeout does not keep the loop alive on its own.
            let _keepalive = spawn(async {
                sleep(Duration::from_millis(50)).await;
                Ok(())
            });
            let err = race([future.clone()], &timeout).await.unwrap_err();
            let Error::Cancelled(cancelled) = &err else {
                panic!("expected cancellation, got {err:?}");
            };
            assert!(matches!(cancelled.cause(), Some(Error::Timeout(_))));
            assert_eq!(future.subscriber_count(), 0);
        })
    }
}
