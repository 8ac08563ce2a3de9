//! Store error model.

use thiserror::Error;

/// Result type returned by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error code the store uses to signal throttling.
pub const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";

/// Classified failure reported by a key-value store.
///
/// The classification is what retry decisions are made on: only
/// [`StoreError::RateLimited`] is transient. Everything else is surfaced to the
/// caller as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The caller exceeded its provisioned request capacity.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request was rejected (validation, permissions, conditional check...).
    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The store could not be reached or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn rejected(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Store-level error code, in the store's own vocabulary.
    pub fn code(&self) -> &str {
        match self {
            Self::RateLimited(_) => THROUGHPUT_EXCEEDED,
            Self::Rejected { code, .. } => code,
            Self::Unavailable(_) => "ServiceUnavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limited_is_classified_as_throttling() {
        assert!(StoreError::rate_limited("slow down").is_rate_limited());
        assert!(!StoreError::rejected("ValidationException", "bad key").is_rate_limited());
        assert!(!StoreError::unavailable("connection reset").is_rate_limited());
    }

    #[test]
    fn codes_follow_store_vocabulary() {
        assert_eq!(StoreError::rate_limited("x").code(), THROUGHPUT_EXCEEDED);
        assert_eq!(
            StoreError::rejected("AccessDeniedException", "no").code(),
            "AccessDeniedException"
        );
    }
}
