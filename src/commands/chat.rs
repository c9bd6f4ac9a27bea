//! Chat Commands
//!
//! The chat endpoint. Each turn runs in its own task tied to a
//! cancellation token; when the client disconnects axum drops the handler
//! future, the drop guard cancels the token and the turn stops making
//! reasoning calls. Plan steps already committed stay committed.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::models::chat::{ChatRequest, ChatResponse};
use crate::models::response::CommandResponse;
use crate::state::AppState;
use crate::utils::error::AppError;

const INTERNAL_ERROR_MESSAGE: &str =
    "Something went wrong while handling this message. Please try again.";

/// Handle one chat message
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<CommandResponse<ChatResponse>>) {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let router = state.router();
    let turn_cancel = cancel.clone();
    let handle = tokio::spawn(async move { router.handle(&request, &turn_cancel).await });

    match handle.await {
        Ok(Ok(response)) => (StatusCode::OK, Json(CommandResponse::ok(response))),
        Ok(Err(AppError::Validation(message))) => {
            (StatusCode::BAD_REQUEST, Json(CommandResponse::err(message)))
        }
        Ok(Err(e)) => {
            error!(error = %e, "chat turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CommandResponse::err(INTERNAL_ERROR_MESSAGE)),
            )
        }
        Err(e) => {
            error!(error = %e, "chat turn task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CommandResponse::err(INTERNAL_ERROR_MESSAGE)),
            )
        }
    }
}
