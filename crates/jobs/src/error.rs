//! Sweep error model.

use thiserror::Error;

use stagger_core::StoreError;

/// Result type used across the sweep.
pub type SweepResult<T> = Result<T, SweepError>;

/// Failure of a store call after the retry policy gave up on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Every allowed attempt was rate limited.
    #[error("{operation}: still throttled after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        source: StoreError,
    },

    /// A non-retryable store error.
    #[error("{operation} failed: {source}")]
    Fatal {
        operation: String,
        source: StoreError,
    },
}

impl RetryError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Exhausted { source, .. } | Self::Fatal { source, .. } => source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Run-level failure. Any of these aborts the run without a report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SweepError {
    #[error("scan of page {page} failed: {source}")]
    ScanFailed { page: u64, source: RetryError },

    #[error("expiry computation failed: {0}")]
    Clock(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SweepError {
    pub fn clock(msg: impl Into<String>) -> Self {
        Self::Clock(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
