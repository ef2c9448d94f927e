//! Error types for the mapping core.
//!
//! Refresh failures never reach lookup callers. They are absorbed by the
//! [`Mapper`](crate::Mapper) and reported through its health snapshot, which
//! is why [`RefreshError`] is `Clone`: every caller coalesced onto the same
//! cycle receives its own copy of the outcome.

use thiserror::Error;

/// Failures reported by a [`ProfileSource`](crate::ProfileSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Authentication or configuration failure talking to the directory.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Rate limited, and the source's own retries are exhausted.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection or transport failure, retries exhausted.
    #[error("Network error: {0}")]
    Network(String),
}

impl SourceError {
    /// Whether the failure is transient (worth trying again next cycle).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Network(_))
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream",
            Self::RateLimited(_) => "rate_limited",
            Self::Network(_) => "network",
        }
    }
}

/// Why a refresh cycle did not publish a new index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Enumeration failed before any record was produced.
    #[error(transparent)]
    Source(SourceError),

    /// Enumeration stopped partway; the partial index was discarded.
    #[error("Enumeration failed after {processed} records: {source}")]
    PartialEnumeration {
        /// Records received before the failure.
        processed: usize,
        /// The underlying source failure.
        source: SourceError,
    },

    /// The cycle exceeded its wall-clock budget.
    #[error("Refresh timed out after {0} seconds")]
    Timeout(u64),

    /// The mapper was shut down while the cycle was running.
    #[error("Refresh cancelled by shutdown")]
    Cancelled,

    /// The cycle task itself failed (panicked or was aborted).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RefreshError {
    /// Stable machine-readable kind, used in health reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Source(e) => e.kind(),
            Self::PartialEnumeration { .. } => "partial_enumeration",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failures reading or writing the warm-start store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Persisted document was written by an incompatible version.
    #[error("Unsupported cache format version {0}")]
    UnsupportedVersion(u32),

    /// Redis connection or command failure.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend-specific failure.
    #[error("Store error: {0}")]
    Backend(String),
}

/// Result type for warm-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a single refresh cycle: the number of published entries.
pub type RefreshResult = std::result::Result<usize, RefreshError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RefreshError::PartialEnumeration {
            processed: 12,
            source: SourceError::Network("connection reset".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Enumeration failed after 12 records: Network error: connection reset"
        );

        let err = RefreshError::Source(SourceError::Upstream("invalid_auth".to_string()));
        assert_eq!(err.to_string(), "Upstream error: invalid_auth");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RefreshError::Source(SourceError::RateLimited("x".into())).kind(),
            "rate_limited"
        );
        assert_eq!(RefreshError::Timeout(5).kind(), "timeout");
        assert_eq!(RefreshError::Cancelled.kind(), "cancelled");
        assert!(SourceError::Network("x".into()).is_transient());
        assert!(!SourceError::Upstream("x".into()).is_transient());
    }
}
