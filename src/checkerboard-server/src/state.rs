//! Application state shared across request handlers.

use std::time::{Duration, Instant};

use checkerboard_core::Mapper;

use crate::config::ServerConfig;

/// Application state shared across request handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// The mapping service.
    pub mapper: Mapper,
    /// Start time.
    start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, mapper: Mapper) -> Self {
        Self {
            config,
            mapper,
            start_time: Instant::now(),
        }
    }

    /// Time since the server started.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
