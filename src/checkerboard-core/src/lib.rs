//! Checkerboard core - the Slack <-> GitHub identity mapping cache.
//!
//! This crate provides:
//! - [`normalize_github`]: canonicalization of the profile field value
//! - [`MappingIndex`] / [`IndexBuilder`]: immutable bidirectional snapshots
//! - [`Mapper`]: lock-free lookups, single-flight refresh cycles and the
//!   periodic refresh loop
//! - [`ProfileSource`] / [`WarmStore`]: the seams to the directory and to
//!   warm-start persistence, with [`FileStore`] and [`RedisStore`] as the
//!   bundled stores
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use checkerboard_core::{Mapper, MapperOptions};
//!
//! let mapper = Mapper::new(Arc::new(source), None, MapperOptions::default());
//! mapper.start().await;
//! let _loop = mapper.spawn_refresh_loop();
//!
//! if let Some(github) = mapper.lookup_by_slack("U012AB3CD") {
//!     println!("{github}");
//! }
//! ```

pub mod error;
pub mod health;
pub mod index;
pub mod mapper;
pub mod normalize;
pub mod redis_store;
pub mod source;
pub mod store;

pub use error::{RefreshError, RefreshResult, SourceError, StoreError, StoreResult};
pub use health::{MapperHealth, RefreshFailure};
pub use index::{Entry, GithubMatch, IndexBuilder, MappingIndex, ReverseEntry};
pub use mapper::{DEFAULT_REFRESH_INTERVAL, DEFAULT_REFRESH_TIMEOUT, Mapper, MapperOptions};
pub use normalize::{github_key, normalize_github};
pub use source::{ProfileRecord, ProfileSource, ProfileStream};
pub use redis_store::{DEFAULT_REDIS_KEY, MappingHash, RedisStore};
pub use store::{FileStore, WarmStore};
