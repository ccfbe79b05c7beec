//! Error types for iterly.

use std::any::Any;

use thiserror::Error;

/// Result type alias using iterly's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by sources and user-supplied functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by user-supplied transforms, predicates and reducers.
pub type Fallible<T> = std::result::Result<T, BoxError>;

/// Main error type for iterly operations.
///
/// Exhaustion is not an error: it is reported as `Ok(None)` by every pull.
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream source failed to produce an item.
    #[error("upstream pull failed: {0}")]
    Upstream(#[source] BoxError),

    /// A transform, predicate or reducer failed for one item.
    #[error("{stage} function failed on item {index}: {source}")]
    Function {
        /// Name of the stage whose function failed.
        stage: String,
        /// Upstream position of the item being processed.
        index: u64,
        /// The error returned by the function.
        #[source]
        source: BoxError,
    },

    /// Invalid construction arguments.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The slot was interrupted by cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// The ticket's resolver went away before resolving it.
    #[error("ticket abandoned before it was resolved")]
    Abandoned,

    /// A spawned work unit panicked or was aborted.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A pull or user function panicked while a job was running.
    #[error("{stage} panicked on item {index}: {message}")]
    Panicked {
        /// Name of the stage whose job panicked.
        stage: String,
        /// Upstream position of the item being processed.
        index: u64,
        /// The panic message, when it was a string.
        message: String,
    },
}

impl Error {
    /// Wrap a source failure.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into())
    }

    /// Wrap a user function failure for the item at `index`.
    pub fn function(stage: impl Into<String>, index: u64, err: impl Into<BoxError>) -> Self {
        Self::Function {
            stage: stage.into(),
            index,
            source: err.into(),
        }
    }

    /// Build a [`Error::Panicked`] from a caught panic payload.
    pub(crate) fn panicked(stage: &str, index: u64, payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self::Panicked {
            stage: stage.to_string(),
            index,
            message,
        }
    }

    /// Whether this error was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_error_display() {
        let err = Error::function("double", 3, "boom");
        assert_eq!(err.to_string(), "double function failed on item 3: boom");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_upstream_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err = Error::upstream(io);
        assert!(matches!(err, Error::Upstream(_)));
        assert!(!err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_panicked_keeps_message() {
        let err = Error::panicked("parse", 2, Box::new("bad input"));
        assert_eq!(err.to_string(), "parse panicked on item 2: bad input");

        let err = Error::panicked("parse", 5, Box::new(format!("row {}", 5)));
        assert!(matches!(err, Error::Panicked { index: 5, ref message, .. } if message == "row 5"));

        let err = Error::panicked("parse", 0, Box::new(7u8));
        assert!(err.to_string().ends_with("non-string panic payload"));
    }
}
