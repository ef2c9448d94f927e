//! Health and metadata reporting for the mapper.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RefreshError;

/// Most recent refresh failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshFailure {
    /// Machine-readable kind (e.g. `upstream`, `timeout`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// When the failing cycle ended.
    pub at: DateTime<Utc>,
}

impl RefreshFailure {
    pub(crate) fn from_error(error: &RefreshError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// Snapshot of the mapper's state for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct MapperHealth {
    /// Entries in the published index.
    pub entry_count: usize,
    /// Generation of the published index (0 = empty or warm-loaded).
    pub generation: u64,
    /// Whether the published index came from the warm-start store.
    pub warm_start: bool,
    /// Time of the last successful refresh.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Time the last refresh cycle started.
    pub last_attempt: Option<DateTime<Utc>>,
    /// Failure of the most recent cycle, cleared by the next success.
    pub last_error: Option<RefreshFailure>,
    /// A refresh cycle is currently running.
    pub refreshing: bool,
    /// Configured interval between scheduled refreshes.
    pub refresh_interval_secs: u64,
    /// Name of the profile field holding GitHub usernames.
    pub profile_field: String,
}

/// Mutable refresh bookkeeping, written only by the refresh path.
#[derive(Debug, Default)]
pub(crate) struct RefreshStatus {
    pub last_refresh: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<RefreshFailure>,
    pub warm_start: bool,
}
