//! Redis-backed warm-start store.
//!
//! The mapping lives in one hash, Slack ID to GitHub username. A save builds
//! the replacement under a staging key and renames it over the live key in a
//! single `MULTI`, so a reader never sees half of a save.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::index::{Entry, MappingIndex};
use crate::store::WarmStore;

/// Key of the mapping hash.
pub const DEFAULT_REDIS_KEY: &str = "checkerboard:mapping";

/// Whole-hash reads and replacements; the only Redis operations the store
/// needs.
#[async_trait]
pub trait MappingHash: Send + Sync {
    /// Every field of the hash at `key`. A missing key reads as empty.
    async fn read_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Atomically replace the hash at `key` with `fields`. No fields deletes
    /// the key.
    async fn replace_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;
}

#[async_trait]
impl MappingHash for ConnectionManager {
    async fn read_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn replace_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        let mut conn = self.clone();
        let staging = format!("{key}:staging");

        let mut pipe = redis::pipe();
        pipe.atomic().del(&staging).ignore();
        if fields.is_empty() {
            pipe.del(key).ignore();
        } else {
            pipe.hset_multiple(&staging, fields)
                .ignore()
                .rename(&staging, key)
                .ignore();
        }
        let (): () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

/// [`WarmStore`] keeping the mapping in a Redis hash.
pub struct RedisStore<H = ConnectionManager> {
    hash: H,
    key: String,
}

impl<H> std::fmt::Debug for RedisStore<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("key", &self.key).finish()
    }
}

impl RedisStore {
    /// Connect to Redis at `url`. A non-empty `password` overrides any
    /// password in the URL.
    pub async fn connect(url: &str, password: Option<&str>) -> StoreResult<Self> {
        let mut info = url.into_connection_info()?;
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.to_string());
        }

        let client = redis::Client::open(info)?;
        let manager = ConnectionManager::new(client).await?;
        info!(key = DEFAULT_REDIS_KEY, "Connected to Redis mapping cache");
        Ok(Self::with_hash(manager))
    }
}

impl<H: MappingHash> RedisStore<H> {
    pub fn with_hash(hash: H) -> Self {
        Self {
            hash,
            key: DEFAULT_REDIS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<H: MappingHash> WarmStore for RedisStore<H> {
    async fn load(&self) -> StoreResult<Option<MappingIndex>> {
        let fields = self.hash.read_all(&self.key).await?;
        if fields.is_empty() {
            debug!(key = %self.key, "No mapping cached in Redis");
            return Ok(None);
        }

        let entries: Vec<Entry> = fields
            .into_iter()
            .filter(|(slack_id, github)| !slack_id.is_empty() && !github.is_empty())
            .map(|(slack_id, github)| Entry::new(slack_id, github))
            .collect();
        info!(key = %self.key, entries = entries.len(), "Loaded mapping cache from Redis");
        Ok(Some(MappingIndex::from_entries(entries)))
    }

    async fn save(&self, index: &MappingIndex) -> StoreResult<()> {
        let fields: Vec<(String, String)> = index
            .entries()
            .into_iter()
            .map(|entry| (entry.slack_id, entry.github_username))
            .collect();
        self.hash.replace_all(&self.key, &fields).await?;
        debug!(key = %self.key, entries = fields.len(), "Saved mapping cache to Redis");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use parking_lot::Mutex;

    /// In-memory stand-in for a Redis connection.
    #[derive(Default)]
    struct MemoryHash {
        keys: Mutex<HashMap<String, HashMap<String, String>>>,
        unavailable: bool,
    }

    #[async_trait]
    impl MappingHash for MemoryHash {
        async fn read_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
            if self.unavailable {
                return Err(StoreError::Backend("connection refused".to_string()));
            }
            Ok(self.keys.lock().get(key).cloned().unwrap_or_default())
        }

        async fn replace_all(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
            if self.unavailable {
                return Err(StoreError::Backend("connection refused".to_string()));
            }
            let mut keys = self.keys.lock();
            if fields.is_empty() {
                keys.remove(key);
            } else {
                keys.insert(key.to_string(), fields.iter().cloned().collect());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_empty_hash_loads_nothing() {
        let store = RedisStore::with_hash(MemoryHash::default());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_mapping() {
        let store = RedisStore::with_hash(MemoryHash::default());

        store
            .save(&MappingIndex::from_entries(vec![
                Entry::new("U1", "Octocat"),
                Entry::new("U2", "hubot"),
            ]))
            .await
            .unwrap();
        store
            .save(&MappingIndex::from_entries(vec![Entry::new("U3", "Octocat")]))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries(), vec![Entry::new("U3", "Octocat")]);
        assert_eq!(loaded.slack_for("octocat").unwrap().slack_id, "U3");
        assert_eq!(loaded.github_for("U1"), None);
    }

    #[tokio::test]
    async fn test_saving_empty_index_clears_key() {
        let store = RedisStore::with_hash(MemoryHash::default()).with_key("mapper:mapping");
        store
            .save(&MappingIndex::from_entries(vec![Entry::new("U1", "octocat")]))
            .await
            .unwrap();
        store.save(&MappingIndex::empty()).await.unwrap();

        assert!(store.hash.keys.lock().get("mapper:mapping").is_none());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_skips_blank_values() {
        let hash = MemoryHash::default();
        hash.keys.lock().insert(
            DEFAULT_REDIS_KEY.to_string(),
            HashMap::from([
                ("U1".to_string(), "octocat".to_string()),
                ("U2".to_string(), String::new()),
            ]),
        );
        let store = RedisStore::with_hash(hash);

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.entries(), vec![Entry::new("U1", "octocat")]);
    }

    #[tokio::test]
    async fn test_backend_errors_surface() {
        let store = RedisStore::with_hash(MemoryHash {
            unavailable: true,
            ..Default::default()
        });
        assert!(matches!(store.load().await, Err(StoreError::Backend(_))));
        assert!(store.save(&MappingIndex::empty()).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let err = RedisStore::connect("not a url", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Redis(_)));
    }
}
