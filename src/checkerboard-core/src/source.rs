//! The upstream directory, as the mapper sees it.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SourceError;

/// One enumerated directory user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    /// Slack user ID.
    pub slack_id: String,
    /// Raw value of the GitHub profile field, if the user has one.
    pub github_field: Option<String>,
}

impl ProfileRecord {
    pub fn new(slack_id: impl Into<String>, github_field: Option<&str>) -> Self {
        Self {
            slack_id: slack_id.into(),
            github_field: github_field.map(str::to_string),
        }
    }
}

/// Stream of enumerated profile records.
pub type ProfileStream<'a> = BoxStream<'a, Result<ProfileRecord, SourceError>>;

/// Capability to enumerate every user in the directory.
///
/// Implementations handle pagination and rate-limit retries internally and
/// only surface an error once they have given up. Each call starts a fresh
/// enumeration; a stream cannot be resumed after an error.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Start enumerating users.
    async fn enumerate_users(&self) -> Result<ProfileStream<'_>, SourceError>;

    /// Name of the profile field being read, for health reporting.
    fn profile_field(&self) -> &str;
}
