//! Warm-start persistence for the last published index.
//!
//! The store only exists so a restarted process can answer lookups before
//! its first refresh finishes. Nothing here is authoritative: Slack is.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::index::{Entry, MappingIndex};

/// Current on-disk document version.
const CACHE_FORMAT_VERSION: u32 = 1;

/// Persisted load/save of a [`MappingIndex`].
#[async_trait]
pub trait WarmStore: Send + Sync {
    /// Load the last saved index, or `None` if nothing was saved.
    async fn load(&self) -> StoreResult<Option<MappingIndex>>;

    /// Save an index, replacing whatever was stored.
    async fn save(&self, index: &MappingIndex) -> StoreResult<()>;
}

/// Serialized form of a saved index.
#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<Entry>,
}

/// [`WarmStore`] backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mapping".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl WarmStore for FileStore {
    async fn load(&self) -> StoreResult<Option<MappingIndex>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No mapping cache file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let document: CacheDocument = serde_json::from_str(&content)?;
        if document.version != CACHE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(document.version));
        }

        info!(
            path = %self.path.display(),
            entries = document.entries.len(),
            saved_at = %document.saved_at,
            "Loaded mapping cache"
        );
        Ok(Some(MappingIndex::from_entries(document.entries)))
    }

    /// Writes to a sibling temp file, fsyncs, then renames over the target
    /// so a crash never leaves a truncated cache.
    async fn save(&self, index: &MappingIndex) -> StoreResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let document = CacheDocument {
            version: CACHE_FORMAT_VERSION,
            saved_at: Utc::now(),
            entries: index.entries(),
        };
        let content = serde_json::to_vec_pretty(&document)?;

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), entries = index.len(), "Saved mapping cache");
        Ok(())
    }
}
