//! Router Controller
//!
//! Runs one turn: gatekeeper, then Analyst, Strategist, executor-prep and
//! Responder in order. The controller holds no per-turn state of its own,
//! so concurrent turns share nothing but the stores behind the toolsets.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use counsel_core::OrchestratorContext;

use super::analyst::{Analyst, IntentDecision};
use super::branches::{AdminBranch, LegalBranch};
use super::responder::{apology, Responder};
use super::strategist::{ExecutionPath, Strategist};
use super::turn::{cancellable, ConversationTurn};
use crate::models::chat::{AgentType, ChatMetadata, ChatRequest, ChatResponse};
use crate::services::admin::PlanOutcome;
use crate::services::gatekeeper::classify_fast;
use crate::services::retrieval::normalize::has_arabic;
use crate::utils::error::{AppError, AppResult};

pub struct RouterController {
    analyst: Analyst,
    strategist: Strategist,
    legal: LegalBranch,
    admin: AdminBranch,
    responder: Responder,
    history_limit: usize,
}

impl RouterController {
    pub fn new(
        analyst: Analyst,
        strategist: Strategist,
        legal: LegalBranch,
        admin: AdminBranch,
        responder: Responder,
        history_limit: usize,
    ) -> Self {
        Self {
            analyst,
            strategist,
            legal,
            admin,
            responder,
            history_limit,
        }
    }

    /// Handle one chat message end to end.
    pub async fn handle(&self, request: &ChatRequest, cancel: &CancellationToken) -> AppResult<ChatResponse> {
        let turn = self.process(request, cancel).await?;
        Ok(build_response(&turn))
    }

    /// Run every stage and return the finished turn.
    pub async fn process(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ConversationTurn> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AppError::validation("message cannot be empty"));
        }
        if request.lawyer_id.trim().is_empty() {
            return Err(AppError::validation("lawyer_id cannot be empty"));
        }

        let turn_id = Uuid::new_v4().to_string();
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&turn_id)
            .to_string();
        let ctx = OrchestratorContext::new(
            turn_id.as_str(),
            session_id,
            request.tenant_id(),
            request.lawyer_id.trim(),
        )?;
        let mut turn = ConversationTurn::new(
            message,
            request.mode,
            request.context.country.clone(),
            request.history_messages(self.history_limit),
            ctx,
        );

        // Gatekeeper
        if let Some(fast) = classify_fast(&turn.request) {
            info!(turn_id = %turn_id, rule = ?fast.rule, "gatekeeper answered without a reasoning call");
            turn.intent.set(IntentDecision::gatekeeper())?;
            turn.reply.set(self.responder.fast(&fast))?;
            turn.path.set(ExecutionPath::Fast { result: fast })?;
            return Ok(turn);
        }

        // Analyst
        let decision = cancellable(cancel, self.analyst.classify(&turn.request, &turn.history))
            .await
            .unwrap_or_else(|| IntentDecision::fallback("turn cancelled"));
        info!(
            turn_id = %turn_id,
            intent = %decision.intent,
            confidence = decision.confidence,
            "analyst stage finished"
        );

        // Strategist
        let path = self
            .strategist
            .select(&decision, turn.mode, &turn.request, turn.country.as_deref());
        info!(turn_id = %turn_id, path = path.name(), "strategist selected path");
        turn.intent.set(decision)?;
        turn.path.set(path.clone())?;

        // Executor-prep
        match &path {
            ExecutionPath::Legal { query } => {
                let result = self
                    .legal
                    .run(&turn.request, query, &turn.ctx, &turn.invocations, cancel)
                    .await;
                match result {
                    Ok(findings) => turn.legal.set(findings)?,
                    Err(e) => {
                        warn!(turn_id = %turn_id, error = %e, "legal branch failed");
                        turn.branch_error.set(e.to_string())?;
                    }
                }
            }
            ExecutionPath::Admin => {
                let result = self
                    .admin
                    .run(&turn.request, &turn.history, &turn.ctx, &turn.invocations, cancel)
                    .await;
                match result {
                    Ok(findings) => {
                        let committed = findings
                            .results
                            .iter()
                            .filter(|r| r.is_success())
                            .count();
                        if cancel.is_cancelled() && committed > 0 {
                            warn!(turn_id = %turn_id, committed, "turn cancelled after committing plan steps");
                        }
                        turn.admin.set(findings)?;
                    }
                    Err(e) => {
                        warn!(turn_id = %turn_id, error = %e, "admin branch failed");
                        turn.branch_error.set(e.to_string())?;
                    }
                }
            }
            ExecutionPath::Direct { .. } | ExecutionPath::Fast { .. } => {}
        }

        // Responder
        let arabic = has_arabic(&turn.request);
        let reply = if turn.branch_error.is_set() {
            apology(arabic)
        } else {
            match &path {
                ExecutionPath::Legal { .. } => match turn.legal.get() {
                    Some(findings) => self.responder.legal(&turn.request, findings, cancel).await,
                    None => apology(arabic),
                },
                ExecutionPath::Admin => match turn.admin.get() {
                    Some(findings) => self.responder.admin(&turn.request, findings),
                    None => apology(arabic),
                },
                ExecutionPath::Direct { .. } => {
                    self.responder.direct(&turn.request, &turn.history, cancel).await
                }
                ExecutionPath::Fast { result } => self.responder.fast(result),
            }
        };
        turn.reply.set(reply)?;

        info!(
            turn_id = %turn_id,
            path = path.name(),
            tool_calls = turn.invocations.snapshot().len(),
            "turn finished"
        );
        Ok(turn)
    }
}

/// Reply plus the metadata of the branch that actually ran.
pub fn build_response(turn: &ConversationTurn) -> ChatResponse {
    let mut metadata = ChatMetadata::default();
    let path = turn.path.get();

    if let Some(decision) = turn.intent.get() {
        let mut cognitive = serde_json::to_value(decision).unwrap_or_default();
        if let Some(path) = path {
            cognitive["path"] = json!(path.name());
            if let ExecutionPath::Direct { reason } = path {
                cognitive["direct_reason"] = json!(reason);
            }
        }
        metadata.cognitive_decision = Some(cognitive);
        metadata.confidence = Some(decision.confidence);
    }

    match path {
        Some(ExecutionPath::Fast { .. }) => metadata.agent_type = Some(AgentType::Gatekeeper),
        Some(ExecutionPath::Direct { .. }) | None => metadata.agent_type = Some(AgentType::Direct),
        Some(ExecutionPath::Legal { .. }) => {
            metadata.agent_type = Some(AgentType::LegalResearch);
            if let Some(findings) = turn.legal.get() {
                let passages: Vec<Value> = findings
                    .retrieval
                    .passages
                    .iter()
                    .map(|p| {
                        json!({
                            "source_id": p.source_id,
                            "source_title": p.source_title,
                            "header": p.header,
                            "snippet": p.snippet,
                            "similarity_score": p.similarity_score,
                            "exact_phrase_match": p.exact_phrase_match,
                        })
                    })
                    .collect();
                metadata.workflow_plan = Some(json!({
                    "query": findings.query,
                    "passages": passages,
                    "semantic_degraded": findings.retrieval.semantic_degraded,
                    "panel": findings.panel,
                }));
            }
        }
        Some(ExecutionPath::Admin) => {
            metadata.agent_type = Some(AgentType::Admin);
            if let Some(findings) = turn.admin.get() {
                metadata.execution_plan = serde_json::to_value(&findings.outcome).ok();
                if matches!(findings.outcome, PlanOutcome::Ready { .. }) {
                    metadata.execution_results = Some(findings.results.clone());
                }
            }
        }
    }

    ChatResponse {
        message: turn.reply.get().cloned().unwrap_or_default(),
        metadata,
    }
}
