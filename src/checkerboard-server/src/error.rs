//! Error types for the HTTP service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkerboard_core::RefreshError;
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or wrong credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The requested user has no mapping.
    #[error("{0}")]
    UnknownUser(String),

    /// A forced refresh failed; the previous mapping is still served.
    #[error("Refresh failed: {message}")]
    Refresh {
        /// Machine-readable failure kind.
        kind: &'static str,
        /// Failure description.
        message: String,
    },

    /// Service unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::UnknownUser(_) => StatusCode::NOT_FOUND,
            Self::Refresh { .. } => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_failed",
            Self::UnknownUser(_) => "unknown_user",
            Self::Refresh { .. } => "refresh_failed",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Refresh { kind, .. } => Some(serde_json::json!({ "kind": kind })),
            _ => None,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

impl From<RefreshError> for AppError {
    fn from(error: RefreshError) -> Self {
        match error {
            RefreshError::Cancelled => Self::Unavailable("server is shutting down".to_string()),
            RefreshError::Internal(message) => Self::Internal(message),
            other => Self::Refresh {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for the app server.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use checkerboard_core::SourceError;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Authentication("test".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::UnknownUser("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::UnknownUser("x".into()).error_code(), "unknown_user");
    }

    #[test]
    fn test_refresh_error_conversion() {
        let err: AppError = RefreshError::Timeout(30).into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Refresh failed: Refresh timed out after 30 seconds");
        assert_eq!(err.details(), Some(serde_json::json!({"kind": "timeout"})));

        let err: AppError =
            RefreshError::Source(SourceError::RateLimited("slow down".into())).into();
        assert_eq!(err.error_code(), "refresh_failed");

        let err: AppError = RefreshError::Cancelled.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
