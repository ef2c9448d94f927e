//! Lookup endpoints.
//!
//! Every body is a JSON object keyed by Slack ID, so single lookups and the
//! full listing share one shape.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

type MappingBody = BTreeMap<String, String>;

/// All known mappings.
pub async fn list_mappings(State(state): State<Arc<AppState>>) -> Json<MappingBody> {
    let mappings = state
        .mapper
        .all_mappings()
        .into_iter()
        .map(|entry| (entry.slack_id, entry.github_username))
        .collect();
    Json(mappings)
}

/// GitHub username for a Slack user.
pub async fn get_by_slack(
    State(state): State<Arc<AppState>>,
    Path(slack_id): Path<String>,
) -> AppResult<Json<MappingBody>> {
    let github = state.mapper.lookup_by_slack(&slack_id).ok_or_else(|| {
        debug!(slack_id = %slack_id, "No mapping for Slack user");
        AppError::UnknownUser(format!("Slack user {slack_id} not found"))
    })?;
    Ok(Json(BTreeMap::from([(slack_id, github)])))
}

/// Slack user for a GitHub username, echoing the username as requested.
pub async fn get_by_github(
    State(state): State<Arc<AppState>>,
    Path(github_id): Path<String>,
) -> AppResult<Json<MappingBody>> {
    let found = state.mapper.lookup_by_github(&github_id).ok_or_else(|| {
        debug!(github = %github_id, "No mapping for GitHub user");
        AppError::UnknownUser(format!("GitHub user {github_id} not found"))
    })?;
    Ok(Json(BTreeMap::from([(
        found.slack_id,
        found.github_username,
    )])))
}
