//! HTTP Commands
//!
//! Handlers behind the HTTP surface:
//! - `POST /api/chat` - one chat turn
//! - `GET /api/health` - backend health

pub mod chat;
pub mod health;

pub use chat::*;
pub use health::*;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All API routes over the shared state.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(get_health))
        .with_state(state)
}
