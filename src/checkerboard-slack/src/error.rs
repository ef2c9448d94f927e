//! Error types for the Slack directory client.

use checkerboard_core::SourceError;
use thiserror::Error;

/// Slack API error codes that mean the token itself is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
];

/// Errors that can occur talking to the Slack Web API.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (invalid token, expired, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API request failed.
    #[error("Slack API error: {0}")]
    Api(String),

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds Slack asked us to wait (0 when it did not say).
        retry_after_secs: u64,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The configured profile field label does not exist in the workspace.
    #[error("Unknown profile field: {0}")]
    UnknownField(String),
}

impl SlackError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_)
        )
    }

    /// Server-requested delay before the next attempt.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } if *retry_after_secs > 0 => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            SlackError::Json(err.to_string())
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<SlackError> for SourceError {
    fn from(err: SlackError) -> Self {
        match err {
            SlackError::RateLimited { .. } => SourceError::RateLimited(err.to_string()),
            SlackError::Network(_) | SlackError::Timeout(_) => SourceError::Network(err.to_string()),
            SlackError::Config(_)
            | SlackError::Auth(_)
            | SlackError::Api(_)
            | SlackError::Json(_)
            | SlackError::UnknownField(_) => SourceError::Upstream(err.to_string()),
        }
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// A `"ok": false` response from the Web API.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "ratelimited").
    pub code: String,
    /// Method that failed.
    pub method: String,
    /// `Retry-After` header value, if the response carried one.
    pub retry_after_secs: Option<u64>,
}

impl SlackApiError {
    pub fn new(code: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            method: method.into(),
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after_secs: Option<u64>) -> Self {
        self.retry_after_secs = retry_after_secs;
        self
    }

    /// Whether the code is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.code.as_str(), "ratelimited" | "rate_limited")
    }

    /// Whether the code means the token is unusable.
    pub fn is_auth_failure(&self) -> bool {
        AUTH_ERROR_CODES.contains(&self.code.as_str())
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        if err.is_rate_limited() {
            SlackError::RateLimited {
                retry_after_secs: err.retry_after_secs.unwrap_or(0),
            }
        } else if err.is_auth_failure() {
            SlackError::Auth(format!("{} failed: {}", err.method, err.code))
        } else {
            SlackError::Api(format!("{} failed: {}", err.method, err.code))
        }
    }
}
