//! Response bodies.

use checkerboard_core::MapperHealth;
use serde::Serialize;

/// Application metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub repository_url: String,
    pub uptime_seconds: u64,
}

/// `GET /<name>/` body.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(rename = "_metadata")]
    pub metadata: Metadata,
    pub mapping: MapperHealth,
}

/// `POST /<name>/refresh` body.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    /// Entries in the newly published mapping.
    pub entries: usize,
}
