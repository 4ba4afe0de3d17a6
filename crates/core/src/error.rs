// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the operation executors and workspace lifecycle.
///
/// Every variant maps to a stable wire code via [`OpError::code`]; the job
/// record store mirrors that code one-to-one into the record's `error` field
/// so a polling caller sees the same taxonomy the executor produced.
#[derive(Debug, Error)]
pub enum OpError {
    /// Malformed parameters: bad order array, unparseable range expression,
    /// unknown preset. Never retried.
    #[error("{0}")]
    InvalidInput(String),

    /// A size or page ceiling was exceeded. Never retried.
    #[error("{0}")]
    LimitExceeded(String),

    /// Content sniff mismatch or a transformation-tool failure. Never retried.
    #[error("{0}")]
    UnsupportedFormat(String),

    /// Manifest or result missing: the job never existed or was already
    /// cleaned up. Distinct from `Internal` so callers can tell the two apart.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The originating request or task context was cancelled mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Storage, serialization, or collaborator plumbing failure. The only
    /// variant (together with `Io`) eligible for the worker's redelivery.
    #[error("{0}")]
    Internal(String),
}

impl OpError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn limit_exceeded(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable wire code for this error, mirrored into job records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::LimitExceeded(_) => "LIMIT_EXCEEDED",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Cancelled => "CANCELLED",
            Self::Io { .. } | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the worker may redeliver a task that failed with this error.
    ///
    /// Validation and format failures are deterministic, so retrying them
    /// cannot change the outcome. A missing manifest means the job is gone
    /// for good.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(OpError::invalid_input("x").code(), "INVALID_INPUT");
        assert_eq!(OpError::limit_exceeded("x").code(), "LIMIT_EXCEEDED");
        assert_eq!(OpError::unsupported("x").code(), "UNSUPPORTED_FORMAT");
        assert_eq!(OpError::NotFound("j".into()).code(), "NOT_FOUND");
        assert_eq!(OpError::Cancelled.code(), "CANCELLED");
        assert_eq!(OpError::internal("x").code(), "INTERNAL_ERROR");
        let io = OpError::io("/tmp/x", std::io::Error::other("disk"));
        assert_eq!(io.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_only_internal_class_is_retryable() {
        assert!(!OpError::invalid_input("x").is_retryable());
        assert!(!OpError::unsupported("x").is_retryable());
        assert!(!OpError::NotFound("j".into()).is_retryable());
        assert!(!OpError::Cancelled.is_retryable());
        assert!(OpError::internal("x").is_retryable());
        assert!(OpError::io("/p", std::io::Error::other("e")).is_retryable());
    }

    #[test]
    fn test_display_carries_message() {
        let err = OpError::invalid_input("order array has a duplicate index");
        assert_eq!(err.to_string(), "order array has a duplicate index");
    }
}
