//! Administrative endpoints.

use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::info;

use crate::error::AppResult;
use crate::state::AppState;

use super::types::RefreshResponse;

/// Force a refresh, joining one already in progress.
pub async fn refresh(State(state): State<Arc<AppState>>) -> AppResult<Json<RefreshResponse>> {
    info!("Refresh requested over HTTP");
    let entries = state.mapper.refresh_once().await?;
    Ok(Json(RefreshResponse { entries }))
}
