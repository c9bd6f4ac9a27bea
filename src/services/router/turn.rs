//! Conversation Turn
//!
//! Request-scoped state of one chat message. Every stage output lives in a
//! `WriteOnce` slot owned by the stage that produces it; later stages read
//! it and a second write is an internal error. The turn is dropped once the
//! reply has been built.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use counsel_core::OrchestratorContext;
use counsel_llm::Message;
use counsel_tools::InvocationLog;

use super::analyst::IntentDecision;
use super::branches::{AdminFindings, LegalFindings};
use super::strategist::ExecutionPath;
use crate::models::chat::ChatMode;
use crate::utils::error::{AppError, AppResult};

/// A slot that accepts exactly one value.
#[derive(Debug)]
pub struct WriteOnce<T> {
    field: &'static str,
    value: Option<T>,
}

impl<T> WriteOnce<T> {
    pub fn new(field: &'static str) -> Self {
        Self { field, value: None }
    }

    pub fn set(&mut self, value: T) -> AppResult<()> {
        if self.value.is_some() {
            return Err(AppError::internal(format!(
                "turn field '{}' written twice",
                self.field
            )));
        }
        self.value = Some(value);
        Ok(())
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

pub struct ConversationTurn {
    pub request: String,
    pub mode: ChatMode,
    pub country: Option<String>,
    pub history: Vec<Message>,
    pub ctx: OrchestratorContext,
    /// Tool calls made by whichever branch ran
    pub invocations: InvocationLog,
    pub intent: WriteOnce<IntentDecision>,
    pub path: WriteOnce<ExecutionPath>,
    pub legal: WriteOnce<LegalFindings>,
    pub admin: WriteOnce<AdminFindings>,
    /// Set when the chosen branch failed as a whole
    pub branch_error: WriteOnce<String>,
    pub reply: WriteOnce<String>,
}

impl ConversationTurn {
    pub fn new(
        request: impl Into<String>,
        mode: ChatMode,
        country: Option<String>,
        history: Vec<Message>,
        ctx: OrchestratorContext,
    ) -> Self {
        Self {
            request: request.into(),
            mode,
            country,
            history,
            ctx,
            invocations: InvocationLog::new(),
            intent: WriteOnce::new("intent"),
            path: WriteOnce::new("path"),
            legal: WriteOnce::new("legal"),
            admin: WriteOnce::new("admin"),
            branch_error: WriteOnce::new("branch_error"),
            reply: WriteOnce::new("reply"),
        }
    }

    pub fn turn_id(&self) -> &str {
        self.ctx.turn_id()
    }
}

/// Run `fut` unless the turn is cancelled first.
pub async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
