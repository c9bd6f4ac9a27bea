//! Health Check Commands
//!
//! Reports database, config and knowledge base status.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::response::{CommandResponse, HealthResponse};
use crate::state::AppState;

/// Get the health status of all backend services
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<CommandResponse<HealthResponse>> {
    Json(CommandResponse::ok(state.health().await))
}
