//! The mapper: owns the published index and runs refresh cycles.
//!
//! Readers load the current [`MappingIndex`] from an [`ArcSwap`] and never
//! wait on a refresh. The refresh path is the only writer:
//!
//! ```text
//! Idle -> Enumerating -> Building -> Swapping -> Idle      (success)
//!                    \-> Failed ------------------> Idle   (old index kept)
//! ```
//!
//! At most one cycle runs at a time. A refresh requested while a cycle is in
//! flight joins that cycle and receives its result. Saving to the warm store
//! happens after the cycle has reported, so a slow store never holds up the
//! next refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RefreshError, RefreshResult};
use crate::health::{MapperHealth, RefreshFailure, RefreshStatus};
use crate::index::{Entry, GithubMatch, IndexBuilder, MappingIndex};
use crate::source::ProfileSource;
use crate::store::WarmStore;

/// Default interval between scheduled refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Default wall-clock budget for one refresh cycle.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(1800);

/// Tuning for the refresh loop.
///
/// The interval should comfortably exceed the time a full enumeration takes;
/// nothing enforces that.
#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// Time between scheduled refresh cycles.
    pub refresh_interval: Duration,
    /// Wall-clock budget for a single cycle.
    pub refresh_timeout: Duration,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

type SharedCycle = Shared<BoxFuture<'static, RefreshResult>>;

/// The cycle currently running, if any.
#[derive(Default)]
struct InFlight {
    next_id: u64,
    current: Option<(u64, SharedCycle)>,
}

struct MapperInner {
    source: Arc<dyn ProfileSource>,
    store: Option<Arc<dyn WarmStore>>,
    options: MapperOptions,
    current: ArcSwap<MappingIndex>,
    status: RwLock<RefreshStatus>,
    in_flight: Mutex<InFlight>,
    save_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

/// Slack <-> GitHub mapping service.
///
/// Cheap to clone; clones share the same published index and refresh state.
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<MapperInner>,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("options", &self.inner.options)
            .field("entries", &self.inner.current.load().len())
            .field("has_store", &self.inner.store.is_some())
            .finish()
    }
}

impl Mapper {
    /// Create a mapper with an empty index.
    pub fn new(
        source: Arc<dyn ProfileSource>,
        store: Option<Arc<dyn WarmStore>>,
        options: MapperOptions,
    ) -> Self {
        Self {
            inner: Arc::new(MapperInner {
                source,
                store,
                options,
                current: ArcSwap::from_pointee(MappingIndex::empty()),
                status: RwLock::new(RefreshStatus::default()),
                in_flight: Mutex::new(InFlight::default()),
                save_lock: tokio::sync::Mutex::new(()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn options(&self) -> &MapperOptions {
        &self.inner.options
    }

    /// Populate the initial index.
    ///
    /// Uses the warm-start store when it has data; otherwise waits for a
    /// full refresh. A failed initial refresh is recorded in health and left
    /// for the periodic loop to retry.
    pub async fn start(&self) {
        if let Some(store) = &self.inner.store {
            match store.load().await {
                Ok(Some(index)) if !index.is_empty() => {
                    let entries = index.len();
                    if self.publish_warm(index) {
                        info!(entries, "Serving mapping from warm-start cache");
                        return;
                    }
                }
                Ok(_) => info!("No cached mapping available; refreshing from Slack"),
                Err(e) => warn!(error = %e, "Failed to load mapping cache; refreshing from Slack"),
            }
        }

        if let Err(e) = self.refresh_once().await {
            error!(
                error = %e,
                "Initial mapping refresh failed; serving an empty map until the next refresh"
            );
        }
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// The published index. Holding it pins that generation for the caller.
    pub fn snapshot(&self) -> Arc<MappingIndex> {
        self.inner.current.load_full()
    }

    /// GitHub username declared by a Slack user.
    pub fn lookup_by_slack(&self, slack_id: &str) -> Option<String> {
        self.inner
            .current
            .load()
            .github_for(slack_id)
            .map(str::to_string)
    }

    /// Slack user claiming a GitHub username, compared case-insensitively.
    ///
    /// The returned username is `username` exactly as passed in.
    pub fn lookup_by_github(&self, username: &str) -> Option<GithubMatch> {
        self.inner
            .current
            .load()
            .slack_for(username)
            .map(|entry| GithubMatch {
                slack_id: entry.slack_id.clone(),
                github_username: username.to_string(),
            })
    }

    /// Every mapping in the published index, sorted by Slack ID.
    pub fn all_mappings(&self) -> Vec<Entry> {
        self.snapshot().entries()
    }

    /// Current health and refresh status.
    pub fn health(&self) -> MapperHealth {
        let index = self.inner.current.load();
        let refreshing = self.inner.in_flight.lock().current.is_some();
        let status = self.inner.status.read();
        MapperHealth {
            entry_count: index.len(),
            generation: index.generation(),
            warm_start: status.warm_start,
            last_refresh: status.last_refresh,
            last_attempt: status.last_attempt,
            last_error: status.last_error.clone(),
            refreshing,
            refresh_interval_secs: self.inner.options.refresh_interval.as_secs(),
            profile_field: self.inner.source.profile_field().to_string(),
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Run one refresh cycle and wait for it.
    ///
    /// If a cycle is already running this joins it instead of starting
    /// another enumeration. The cycle runs on its own task, so dropping the
    /// returned future does not abandon it.
    pub async fn refresh_once(&self) -> RefreshResult {
        let cycle = {
            let mut in_flight = self.inner.in_flight.lock();
            let running = in_flight
                .current
                .as_ref()
                .map(|(id, cycle)| (*id, cycle.clone()));
            match running {
                Some((id, cycle)) => {
                    debug!(cycle = id, "Joining in-flight refresh");
                    cycle
                }
                None => {
                    let id = in_flight.next_id;
                    in_flight.next_id += 1;
                    let cycle = self.spawn_cycle(id);
                    in_flight.current = Some((id, cycle.clone()));
                    cycle
                }
            }
        };
        cycle.await
    }

    /// Spawn the periodic refresh task.
    ///
    /// The first scheduled cycle runs one interval from now; call
    /// [`start`](Self::start) first to populate the index.
    pub fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let mapper = self.clone();
        let period = self.inner.options.refresh_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = mapper.inner.shutdown.cancelled() => {
                        info!("Mapping refresh loop stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        debug!(interval_secs = period.as_secs(), "Running scheduled mapping refresh");
                        if let Ok(entries) = mapper.refresh_once().await {
                            debug!(entries, "Scheduled mapping refresh finished");
                        }
                    }
                }
            }
        })
    }

    /// Stop the refresh loop and abandon any in-flight cycle.
    ///
    /// Lookups keep serving the last published index.
    pub fn shutdown(&self) {
        info!("Shutting down mapper");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn spawn_cycle(&self, id: u64) -> SharedCycle {
        let (tx, rx) = oneshot::channel();
        let mapper = self.clone();
        tokio::spawn(async move {
            let result = mapper.run_cycle().await;
            mapper.finish_cycle(id);

            let published = result.as_ref().ok().map(Arc::clone);
            let _ = tx.send(result.map(|index| index.len()));
            if let Some(index) = published {
                mapper.persist(index).await;
            }
        });

        let mapper = self.clone();
        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => {
                    mapper.finish_cycle(id);
                    let error =
                        RefreshError::Internal("refresh task ended without a result".to_string());
                    mapper.record_failure(&error);
                    Err(error)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn finish_cycle(&self, id: u64) {
        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.current.as_ref().is_some_and(|(current, _)| *current == id) {
            in_flight.current = None;
        }
    }

    async fn run_cycle(&self) -> Result<Arc<MappingIndex>, RefreshError> {
        let started = Instant::now();
        self.inner.status.write().last_attempt = Some(Utc::now());
        info!("Refreshing Slack -> GitHub mapping");

        let budget = self.inner.options.refresh_timeout;
        let outcome = tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => Err(RefreshError::Cancelled),
            result = tokio::time::timeout(budget, self.build_index()) => {
                result.unwrap_or(Err(RefreshError::Timeout(budget.as_secs())))
            }
        };

        let index = match outcome {
            Ok(index) => index,
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Mapping refresh failed; keeping previous mapping"
                );
                self.record_failure(&e);
                return Err(e);
            }
        };

        let published = self.publish(index);
        info!(
            entries = published.len(),
            generation = published.generation(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Published refreshed mapping"
        );
        Ok(published)
    }

    /// Save a published index to the warm store.
    ///
    /// Saves run one at a time, newest generation only, and are bounded by
    /// the refresh timeout and by shutdown. Failures are logged and dropped.
    async fn persist(&self, index: Arc<MappingIndex>) {
        let Some(store) = &self.inner.store else {
            return;
        };

        let budget = self.inner.options.refresh_timeout;
        let save = async {
            let _guard = self.inner.save_lock.lock().await;
            if self.inner.current.load().generation() != index.generation() {
                debug!(
                    generation = index.generation(),
                    "Skipping cache save for a superseded mapping"
                );
                return Ok(());
            }
            store.save(&index).await
        };

        let outcome = tokio::select! {
            biased;
            _ = self.inner.shutdown.cancelled() => {
                debug!("Mapping cache save abandoned at shutdown");
                return;
            }
            result = tokio::time::timeout(budget, save) => result,
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to persist mapping cache"),
            Err(_) => warn!(
                timeout_secs = budget.as_secs(),
                "Timed out persisting mapping cache"
            ),
        }
    }

    async fn build_index(&self) -> Result<MappingIndex, RefreshError> {
        let mut stream = self
            .inner
            .source
            .enumerate_users()
            .await
            .map_err(RefreshError::Source)?;

        let mut builder = IndexBuilder::new();
        let mut processed = 0usize;
        while let Some(record) = stream.next().await {
            match record {
                Ok(record) => {
                    processed += 1;
                    builder.push_raw(record.slack_id, record.github_field.as_deref());
                }
                Err(source) if processed == 0 => return Err(RefreshError::Source(source)),
                Err(source) => {
                    return Err(RefreshError::PartialEnumeration { processed, source });
                }
            }
        }

        debug!(
            processed,
            entries = builder.len(),
            superseded = builder.superseded(),
            "Enumeration complete"
        );
        Ok(builder.build())
    }

    /// Swap in a freshly built index. Only the single running cycle calls
    /// this, so reading the old generation then storing is not racy.
    fn publish(&self, index: MappingIndex) -> Arc<MappingIndex> {
        let generation = self.inner.current.load().generation() + 1;
        let index = Arc::new(index.with_generation(generation));
        self.inner.current.store(Arc::clone(&index));

        let mut status = self.inner.status.write();
        status.last_refresh = Some(index.built_at());
        status.last_error = None;
        status.warm_start = false;
        index
    }

    /// Publish a warm-start index unless a refresh already published one.
    fn publish_warm(&self, index: MappingIndex) -> bool {
        let warm = Arc::new(index);
        let previous = self.inner.current.rcu(|current| {
            if current.generation() == 0 && current.is_empty() {
                Arc::clone(&warm)
            } else {
                Arc::clone(current)
            }
        });

        let published = previous.generation() == 0 && previous.is_empty();
        if published {
            self.inner.status.write().warm_start = true;
        }
        published
    }

    fn record_failure(&self, error: &RefreshError) {
        self.inner.status.write().last_error = Some(RefreshFailure::from_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::{ProfileRecord, ProfileStream};
    use async_trait::async_trait;

    struct StaticSource(Vec<ProfileRecord>);

    #[async_trait]
    impl ProfileSource for StaticSource {
        async fn enumerate_users(&self) -> Result<ProfileStream<'_>, SourceError> {
            Ok(futures::stream::iter(self.0.clone().into_iter().map(Ok)).boxed())
        }

        fn profile_field(&self) -> &str {
            "GitHub Username"
        }
    }

    fn mapper(records: Vec<ProfileRecord>) -> Mapper {
        Mapper::new(
            Arc::new(StaticSource(records)),
            None,
            MapperOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_lookups_before_refresh_are_empty() {
        let mapper = mapper(vec![ProfileRecord::new("U1", Some("Octocat"))]);
        assert_eq!(mapper.lookup_by_slack("U1"), None);
        assert!(mapper.all_mappings().is_empty());
        assert_eq!(mapper.health().generation, 0);
    }

    #[tokio::test]
    async fn test_refresh_publishes_scenario() {
        let mapper = mapper(vec![
            ProfileRecord::new("U1", Some("Octocat")),
            ProfileRecord::new("U2", Some("")),
        ]);

        assert_eq!(mapper.refresh_once().await, Ok(1));
        assert_eq!(mapper.lookup_by_slack("U1").as_deref(), Some("Octocat"));
        assert_eq!(mapper.lookup_by_slack("U2"), None);

        let found = mapper.lookup_by_github("octocat").unwrap();
        assert_eq!(found.slack_id, "U1");
        assert_eq!(found.github_username, "octocat");

        assert_eq!(mapper.all_mappings(), vec![Entry::new("U1", "Octocat")]);
    }

    #[tokio::test]
    async fn test_reverse_lookup_echoes_query_case() {
        let mapper = mapper(vec![
            ProfileRecord::new("A", Some("foo")),
            ProfileRecord::new("B", Some("Foo")),
        ]);
        mapper.refresh_once().await.unwrap();

        let found = mapper.lookup_by_github("FOO").unwrap();
        assert_eq!(found.slack_id, "B");
        assert_eq!(found.github_username, "FOO");
    }

    #[tokio::test]
    async fn test_generation_and_health_advance() {
        let mapper = mapper(vec![ProfileRecord::new("U1", Some("octocat"))]);
        mapper.refresh_once().await.unwrap();
        mapper.refresh_once().await.unwrap();

        let health = mapper.health();
        assert_eq!(health.generation, 2);
        assert_eq!(health.entry_count, 1);
        assert!(health.last_refresh.is_some());
        assert!(health.last_error.is_none());
        assert!(!health.refreshing);
        assert_eq!(health.refresh_interval_secs, 3600);
        assert_eq!(health.profile_field, "GitHub Username");
    }

    #[tokio::test]
    async fn test_refresh_after_shutdown_is_cancelled() {
        let mapper = mapper(vec![ProfileRecord::new("U1", Some("octocat"))]);
        mapper.shutdown();
        assert!(mapper.is_shut_down());
        assert_eq!(mapper.refresh_once().await, Err(RefreshError::Cancelled));
        assert_eq!(mapper.health().last_error.unwrap().kind, "cancelled");
    }
}
