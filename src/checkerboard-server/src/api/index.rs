//! Metadata and status endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::state::AppState;

use super::types::{Metadata, StatusResponse};

fn metadata(state: &AppState) -> Metadata {
    Metadata {
        name: state.config.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
        repository_url: env!("CARGO_PKG_REPOSITORY").to_string(),
        uptime_seconds: state.uptime().as_secs(),
    }
}

/// Application metadata.
pub async fn get_index(State(state): State<Arc<AppState>>) -> Json<Metadata> {
    Json(metadata(&state))
}

/// Metadata plus the mapper's health.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        metadata: metadata(&state),
        mapping: state.mapper.health(),
    })
}
