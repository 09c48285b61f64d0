//! Error types shared by futures, cancellations and combinators.
//!
//! Every failure travels as an [`Error`]. Errors are cheap to clone because a
//! single settled future may be observed by any number of consumers, and each
//! of them must see the same failure object.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

/// The `deferred` result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure produced or propagated by this crate.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A failure attached by a producer through `DeferredFuture::error`.
    #[error(transparent)]
    Failure(#[from] Failure),
    /// A wait was abandoned because its cancellation fired.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
    /// The cause recorded by a `TimeoutCancellation`.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// The cause recorded by a `SignalCancellation`.
    #[error(transparent)]
    Signal(#[from] SignalError),
    /// Several futures failed where a combinator needed successes.
    #[error(transparent)]
    Composite(#[from] CompositeError),
    /// A combinator was handed too few futures for what it was asked to do.
    #[error(transparent)]
    Length(#[from] CompositeLengthError),
}

impl Error {
    /// Wraps an arbitrary error as a domain failure.
    pub fn failure<E>(err: E) -> Self
    where
        E: StdError + 'static,
    {
        Error::Failure(Failure::new(err))
    }

    /// Shorthand for a message-only domain failure.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Failure(Failure::msg(message))
    }

    /// Returns `true` if this is a cancellation error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// The domain failure carried by this error, if any.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Error::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// The name used for this error in composite summaries.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::Failure(failure) => failure.type_name(),
            Error::Cancelled(_) => "CancelledError",
            Error::Timeout(_) => "TimeoutError",
            Error::Signal(_) => "SignalError",
            Error::Composite(_) => "CompositeError",
            Error::Length(_) => "CompositeLengthError",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::failure(err)
    }
}

/// A domain failure: the error value a producer attached to a future.
///
/// The wrapped error is shared, so every consumer of a failed future sees the
/// very same object. Use [`Failure::ptr_eq`] to check identity and
/// [`Failure::downcast_ref`] to get at the concrete type.
#[derive(Clone)]
pub struct Failure {
    inner: Rc<dyn StdError + 'static>,
    type_name: &'static str,
}

impl Failure {
    /// Wraps an error value.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + 'static,
    {
        Self {
            inner: Rc::new(err),
            type_name: short_type_name::<E>(),
        }
    }

    /// Creates a failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Attempts to downcast the wrapped error.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Returns `true` if both failures wrap the same error object.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The short type name of the wrapped error.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.inner).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

fn short_type_name<E>() -> &'static str {
    let name = type_name::<E>();
    let path = name.split('<').next().unwrap_or(name);
    match path.rsplit("::").next() {
        Some(short) if short.len() < path.len() => &name[path.len() - short.len()..],
        _ => name,
    }
}

/// A wait was cancelled before the awaited operation settled.
///
/// The reason the cancellation was requested, if one was given, is available
/// through [`StdError::source`] and [`CancelledError::cause`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("the operation was cancelled{}", cause_suffix(.cause))]
pub struct CancelledError {
    #[source]
    cause: Option<Box<Error>>,
}

impl CancelledError {
    /// A cancellation without a specific cause.
    pub fn new() -> Self {
        Self { cause: None }
    }

    /// A cancellation caused by `cause`.
    pub fn with_cause(cause: impl Into<Error>) -> Self {
        Self {
            cause: Some(Box::new(cause.into())),
        }
    }

    /// The recorded cause.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }
}

impl Default for CancelledError {
    fn default() -> Self {
        Self::new()
    }
}

fn cause_suffix(cause: &Option<Box<Error>>) -> String {
    cause.as_ref().map(|cause| format!(": {cause}")).unwrap_or_default()
}

/// The cause recorded when a `TimeoutCancellation` expires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TimeoutError {
    message: String,
}

impl TimeoutError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the timeout was configured with.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The cause recorded when a `SignalCancellation` receives a signal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (signal {signal})")]
pub struct SignalError {
    signal: i32,
    message: String,
}

impl SignalError {
    pub(crate) fn new(signal: i32, message: impl Into<String>) -> Self {
        Self {
            signal,
            message: message.into(),
        }
    }

    /// The signal number that was received.
    pub fn signal(&self) -> i32 {
        self.signal
    }

    /// The message the cancellation was configured with.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every failure collected by a combinator that needed more successes than
/// it got, in the order the failures were observed.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "multiple errors encountered ({}); use CompositeError::errors to inspect each one:{}",
    .errors.len(),
    summary(.errors)
)]
pub struct CompositeError {
    errors: Vec<Error>,
}

impl CompositeError {
    /// # Panics
    ///
    /// Panics if `errors` is empty.
    pub fn new(errors: Vec<Error>) -> Self {
        assert!(
            !errors.is_empty(),
            "a composite error needs at least one cause"
        );
        Self { errors }
    }

    /// The collected failures, in collection order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Consumes the composite and returns the collected failures.
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

fn summary(errors: &[Error]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(index, error)| format!("\n\n#{index} {}: {error}", error.kind_name()))
        .collect()
}

/// A combinator was asked for more futures than it was given.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositeLengthError {
    /// The required count was zero.
    #[error("the number of futures to wait for must be greater than 0")]
    ZeroCount,
    /// Fewer futures were supplied than the combinator requires.
    #[error("{supplied} futures supplied, but at least {required} are required")]
    TooFew {
        /// How many futures the combinator needed.
        required: usize,
        /// How many futures were actually supplied.
        supplied: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_keeps_identity_across_clones() {
        let failure = Failure::msg("boom");
        let copy = failure.clone();
        assert!(failure.ptr_eq(&copy));
        assert!(!failure.ptr_eq(&Failure::msg("boom")));
        assert_eq!(copy.to_string(), "boom");
    }

    #[test]
    fn failure_records_short_type_name() {
        let failure = Failure::new(std::io::Error::other("disk"));
        assert_eq!(failure.type_name(), "Error");
        assert!(failure.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn cancelled_error_exposes_cause() {
        let err = CancelledError::with_cause(TimeoutError::new("too slow"));
        assert!(matches!(err.cause(), Some(Error::Timeout(_))));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("too slow"));
        assert_eq!(err.to_string(), "the operation was cancelled: too slow");
        assert!(CancelledError::new().source().is_none());
    }

    #[test]
    fn composite_message_lists_each_failure() {
        let err = CompositeError::new(vec![
            Error::msg("first"),
            Error::from(TimeoutError::new("second")),
        ]);
        let message = err.to_string();
        assert!(message.starts_with("multiple errors encountered (2)"));
        assert!(message.contains("#0 Message: first"));
        assert!(message.contains("#1 TimeoutError: second"));
    }

    #[test]
    #[should_panic(expected = "at least one cause")]
    fn composite_rejects_empty() {
        CompositeError::new(Vec::new());
    }

    #[test]
    fn length_error_messages() {
        let err = CompositeLengthError::TooFew {
            required: 3,
            supplied: 2,
        };
        assert_eq!(
            err.to_string(),
            "2 futures supplied, but at least 3 are required"
        );
    }
}
