//! Retry and backoff for Web API calls.
//!
//! Rate-limit and transport failures are retried here so that a single
//! throttled request does not fail a whole directory enumeration.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{SlackError, SlackResult};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay.
    pub initial_delay: Duration,
    /// Maximum computed backoff. `Retry-After` may exceed it.
    pub max_delay: Duration,
    /// Backoff strategy.
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::ExponentialBackoff { multiplier: 2.0 },
            jitter: 0.25,
        }
    }
}

/// Backoff strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Exponential backoff.
    ExponentialBackoff { multiplier: f64 },
    /// No delay.
    Immediate,
}

impl BackoffStrategy {
    /// Calculate delay for given attempt.
    pub fn delay(&self, attempt: u32, initial: Duration, max: Duration) -> Duration {
        let delay = match self {
            Self::Fixed => initial,
            Self::ExponentialBackoff { multiplier } => {
                Duration::from_secs_f64(initial.as_secs_f64() * multiplier.powi(attempt as i32))
            }
            Self::Immediate => Duration::ZERO,
        };

        delay.min(max)
    }
}

/// Retry executor.
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute with retry.
    /// Respects Retry-After from rate limit responses (HTTP 429).
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> SlackResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SlackResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match f().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }

                    let delay = self.calculate_delay_with_retry_after(&error, attempt);

                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying Slack call after error"
                    );

                    sleep(delay).await;
                }
            }
        }
    }

    fn calculate_delay_with_retry_after(&self, error: &SlackError, attempt: u32) -> Duration {
        let backoff_delay = self.calculate_delay(attempt);
        match error.retry_after_secs() {
            Some(retry_after_secs) => {
                let delay = Duration::from_secs(retry_after_secs).max(backoff_delay);
                debug!(
                    retry_after_secs,
                    backoff_ms = backoff_delay.as_millis() as u64,
                    final_delay_ms = delay.as_millis() as u64,
                    "Respecting Retry-After from Slack"
                );
                delay
            }
            None => backoff_delay,
        }
    }

    fn should_retry(&self, error: &SlackError, attempt: u32) -> bool {
        attempt < self.config.max_attempts && error.is_retryable()
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay =
            self.config
                .strategy
                .delay(attempt, self.config.initial_delay, self.config.max_delay);

        if self.config.jitter > 0.0 && !base_delay.is_zero() {
            let jitter_range = base_delay.as_secs_f64() * self.config.jitter;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            Duration::from_secs_f64((base_delay.as_secs_f64() + jitter).max(0.0))
        } else {
            base_delay
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Retry builder.
#[derive(Debug, Default)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    /// Set initial delay.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set backoff strategy.
    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set jitter factor.
    pub fn jitter(mut self, factor: f64) -> Self {
        self.config.jitter = factor.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> Retry {
        Retry::new(self.config)
    }

    pub fn into_config(self) -> RetryConfig {
        self.config
    }
}
