//! HTTP Basic authentication.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Credentials presented by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Extract authorization from request headers.
pub fn extract_auth_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Parse `Basic <base64(username:password)>`.
pub fn parse_basic_credentials(auth_header: &str) -> Option<BasicCredentials> {
    let encoded = auth_header
        .strip_prefix("Basic ")
        .or_else(|| auth_header.strip_prefix("basic "))?;
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

impl AuthConfig {
    /// Check credentials against the configured pair.
    ///
    /// Both fields are always compared so the timing does not reveal which
    /// one was wrong.
    pub fn verify(&self, credentials: &BasicCredentials) -> bool {
        let Some(password) = &self.password else {
            return false;
        };
        let username_ok =
            constant_time_compare(credentials.username.as_bytes(), self.username.as_bytes());
        let password_ok = constant_time_compare(
            credentials.password.as_bytes(),
            password.expose_secret().as_bytes(),
        );
        username_ok & password_ok
    }
}

/// Reject requests without valid Basic credentials.
pub async fn basic_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let credentials = extract_auth_header(request.headers()).and_then(parse_basic_credentials);

    match credentials {
        Some(credentials) if state.config.auth.verify(&credentials) => next.run(request).await,
        Some(credentials) => {
            warn!(
                username = %credentials.username,
                path = %request.uri().path(),
                "Rejected invalid credentials"
            );
            unauthorized(&state.config.name, "invalid credentials")
        }
        None => {
            debug!(path = %request.uri().path(), "No Basic authorization header provided");
            unauthorized(&state.config.name, "credentials required")
        }
    }
}

fn unauthorized(realm: &str, reason: &str) -> Response {
    let mut response = AppError::Authentication(reason.to_string()).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
