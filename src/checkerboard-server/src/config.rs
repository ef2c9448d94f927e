//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use checkerboard_core::MapperOptions;
use checkerboard_slack::{DEFAULT_BASE_URL, DEFAULT_PROFILE_FIELD, SlackConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Upper bound on the refresh interval and timeout, in seconds (30 days).
pub const MAX_REFRESH_SECS: u64 = 30 * 24 * 60 * 60;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Application name; also the URL path prefix and the auth realm.
    #[serde(default = "default_name")]
    pub name: String,

    /// Mapping refresh configuration.
    #[serde(default)]
    pub mapper: MapperConfig,

    /// Slack API configuration.
    #[serde(default)]
    pub slack: SlackSettings,

    /// HTTP Basic authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Warm-start cache file. No warm start when neither this nor Redis is
    /// set.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Redis warm-start cache.
    #[serde(default)]
    pub redis: RedisSettings,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_name() -> String {
    "checkerboard".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            name: default_name(),
            mapper: MapperConfig::default(),
            slack: SlackSettings::default(),
            auth: AuthConfig::default(),
            cache_path: None,
            redis: RedisSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("CHECKERBOARD_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(name) = lookup("CHECKERBOARD_NAME").or_else(|| lookup("SAFIR_NAME")) {
            config.name = name;
        }

        if let Some(field) = lookup("CHECKERBOARD_PROFILE_FIELD") {
            config.mapper.profile_field = field;
        }

        if let Some(interval) = lookup("CHECKERBOARD_REFRESH_INTERVAL") {
            config.mapper.refresh_interval = parse_number("CHECKERBOARD_REFRESH_INTERVAL", &interval)?;
        }

        if let Some(timeout) = lookup("CHECKERBOARD_REFRESH_TIMEOUT") {
            config.mapper.refresh_timeout = parse_number("CHECKERBOARD_REFRESH_TIMEOUT", &timeout)?;
        }

        if let Some(concurrency) = lookup("CHECKERBOARD_SLACK_CONCURRENCY") {
            config.slack.concurrency =
                parse_number("CHECKERBOARD_SLACK_CONCURRENCY", &concurrency)?;
        }

        if let Some(token) = lookup("CHECKERBOARD_SLACK_TOKEN") {
            config.slack.token = Some(SecretString::from(token));
        }

        if let Some(username) = lookup("CHECKERBOARD_USERNAME") {
            config.auth.username = username;
        }

        if let Some(password) = lookup("CHECKERBOARD_PASSWORD") {
            config.auth.password = Some(SecretString::from(password));
        }

        if let Some(path) = lookup("CHECKERBOARD_CACHE_PATH").filter(|p| !p.is_empty()) {
            config.cache_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("CHECKERBOARD_REDIS_URL").filter(|u| !u.is_empty()) {
            config.redis.url = Some(url);
        }

        if let Some(password) = lookup("CHECKERBOARD_REDIS_PASSWORD").filter(|p| !p.is_empty()) {
            config.redis.password = Some(SecretString::from(password));
        }

        Ok(config)
    }

    /// Check the settings the service cannot run without.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_name(&self.name) {
            bail!(
                "Application name {:?} must be non-empty and use only letters, digits, '.', '_' or '-'",
                self.name
            );
        }
        if secret_is_empty(&self.slack.token) {
            bail!("Slack token is not configured (CHECKERBOARD_SLACK_TOKEN)");
        }
        if secret_is_empty(&self.auth.password) {
            bail!("Password is not configured (CHECKERBOARD_PASSWORD)");
        }
        if !(1..=MAX_REFRESH_SECS).contains(&self.mapper.refresh_interval) {
            bail!("Refresh interval must be between 1 and {MAX_REFRESH_SECS} seconds");
        }
        if !(1..=MAX_REFRESH_SECS).contains(&self.mapper.refresh_timeout) {
            bail!("Refresh timeout must be between 1 and {MAX_REFRESH_SECS} seconds");
        }
        if self.redis.url.is_some() && self.cache_path.is_some() {
            bail!("Configure either a Redis cache or a cache file, not both");
        }
        Ok(())
    }

    /// Options for the mapper's refresh loop.
    pub fn mapper_options(&self) -> MapperOptions {
        MapperOptions {
            refresh_interval: Duration::from_secs(self.mapper.refresh_interval),
            refresh_timeout: Duration::from_secs(self.mapper.refresh_timeout),
        }
    }

    /// Slack client configuration.
    pub fn slack_config(&self) -> anyhow::Result<SlackConfig> {
        let token = self
            .slack
            .token
            .as_ref()
            .context("Slack token is not configured")?;

        Ok(SlackConfig::new(token.expose_secret())
            .with_profile_field(self.mapper.profile_field.clone())
            .with_base_url(self.slack.base_url.clone())
            .with_concurrency(self.slack.concurrency)
            .with_request_timeout(Duration::from_secs(self.slack.request_timeout)))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Mapping refresh configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MapperConfig {
    /// Label of the Slack custom profile field holding GitHub usernames.
    #[serde(default = "default_profile_field")]
    pub profile_field: String,

    /// Seconds between scheduled refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Seconds one refresh cycle may take before it is abandoned.
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout: u64,
}

fn default_profile_field() -> String {
    DEFAULT_PROFILE_FIELD.to_string()
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_refresh_timeout() -> u64 {
    1800
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            profile_field: default_profile_field(),
            refresh_interval: default_refresh_interval(),
            refresh_timeout: default_refresh_timeout(),
        }
    }
}

/// Slack API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    /// Bot token.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,

    /// Web API base URL.
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,

    /// Profile fetches kept in flight during a refresh.
    #[serde(default = "default_slack_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_slack_request_timeout")]
    pub request_timeout: u64,
}

fn default_slack_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_slack_concurrency() -> usize {
    1
}

fn default_slack_request_timeout() -> u64 {
    30
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_slack_base_url(),
            concurrency: default_slack_concurrency(),
            request_timeout: default_slack_request_timeout(),
        }
    }
}

/// Redis warm-start cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisSettings {
    /// Connection URL, e.g. `redis://redis.checkerboard:6379/0`.
    #[serde(default)]
    pub url: Option<String>,

    /// Password, overriding any in the URL.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

/// HTTP Basic authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Expected username.
    #[serde(default = "default_username")]
    pub username: String,

    /// Expected password.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

fn default_username() -> String {
    "checkerboard".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
        }
    }
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(SecretString::from(password.into())),
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn secret_is_empty(secret: &Option<SecretString>) -> bool {
    secret
        .as_ref()
        .is_none_or(|s| s.expose_secret().is_empty())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{name} must be a non-negative integer, got {value:?}"))
}
