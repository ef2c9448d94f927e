//! HTTP routes and handlers.
//!
//! Everything except `/` lives under `/<name>`, the configured application
//! name.

mod admin;
mod index;
mod mappings;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub use types::{Metadata, RefreshResponse, StatusResponse};

/// Routes served without authentication.
pub fn public_routes(prefix: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index::get_index))
        .route(prefix, get(index::get_status))
        .route(&format!("{prefix}/"), get(index::get_status))
}

/// Routes that require Basic authentication.
pub fn protected_routes(prefix: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{prefix}/slack"), get(mappings::list_mappings))
        .route(
            &format!("{prefix}/slack/{{slack_id}}"),
            get(mappings::get_by_slack),
        )
        .route(
            &format!("{prefix}/github/{{github_id}}"),
            get(mappings::get_by_github),
        )
        .route(&format!("{prefix}/refresh"), post(admin::refresh))
}
