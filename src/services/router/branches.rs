//! Branches
//!
//! The two sub-graphs the executor-prep stage can run. Each is built with
//! its own partition's toolset and nothing else: the legal branch cannot
//! name a record operation and the admin branch cannot name a knowledge
//! tool, because neither holds a handle that could reach them.

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use counsel_core::OrchestratorContext;
use counsel_llm::Message;
use counsel_tools::{ExecutionResult, InvocationLog, LegalPartition, Toolset};

use super::strategist::LegalQuery;
use super::turn::cancellable;
use crate::services::admin::reporter::template_report;
use crate::services::admin::{
    AdminExecutor, AdminPlanner, AdminReport, AdminReporter, PlanOutcome, ReportSource,
};
use crate::services::panel::{DeliberationPanel, PanelFacts, PanelReport};
use crate::services::retrieval::normalize::has_arabic;
use crate::services::retrieval::tools::{EXPAND_CONTEXT, SEARCH_KNOWLEDGE};
use crate::services::retrieval::{ContextWindow, RetrievalOutcome};
use crate::utils::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// Legal branch
// ---------------------------------------------------------------------------

/// What the legal branch found.
#[derive(Debug, Clone, Serialize)]
pub struct LegalFindings {
    pub query: LegalQuery,
    pub retrieval: RetrievalOutcome,
    /// Text around the best passage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextWindow>,
    /// Absent when nothing was retrieved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelReport>,
}

impl LegalFindings {
    pub fn has_passages(&self) -> bool {
        !self.retrieval.passages.is_empty()
    }
}

pub struct LegalBranch {
    toolset: Toolset<LegalPartition>,
    panel: DeliberationPanel,
}

impl LegalBranch {
    pub fn new(toolset: Toolset<LegalPartition>, panel: DeliberationPanel) -> Self {
        Self { toolset, panel }
    }

    pub fn toolset(&self) -> &Toolset<LegalPartition> {
        &self.toolset
    }

    pub async fn run(
        &self,
        request: &str,
        query: &LegalQuery,
        ctx: &OrchestratorContext,
        log: &InvocationLog,
        cancel: &CancellationToken,
    ) -> AppResult<LegalFindings> {
        let mut args = json!({
            "query_text": query.query_text,
            "semantic_query": query.semantic_query,
        });
        if let Some(country) = &query.country {
            args["country"] = json!(country);
        }

        let search_ctx = ctx.create_tool_context(format!("{}-search", ctx.turn_id()));
        let output = self
            .toolset
            .invoke(SEARCH_KNOWLEDGE, &search_ctx, args, log)
            .await?;
        let retrieval: RetrievalOutcome = serde_json::from_value(output)?;

        info!(
            turn_id = ctx.turn_id(),
            passages = retrieval.passages.len(),
            semantic_degraded = retrieval.semantic_degraded,
            "retrieval finished"
        );

        let Some(top) = retrieval.passages.first() else {
            return Ok(LegalFindings {
                query: query.clone(),
                retrieval,
                context: None,
                panel: None,
            });
        };

        let expand_ctx = ctx.create_tool_context(format!("{}-expand", ctx.turn_id()));
        let context = match self
            .toolset
            .invoke(
                EXPAND_CONTEXT,
                &expand_ctx,
                json!({ "source_id": top.source_id, "chunk_index": top.chunk_index }),
                log,
            )
            .await
            .map_err(AppError::from)
            .and_then(|v| Ok(serde_json::from_value::<ContextWindow>(v)?))
        {
            Ok(window) => Some(window),
            Err(e) => {
                warn!(turn_id = ctx.turn_id(), error = %e, "context expansion failed, using the passage alone");
                None
            }
        };

        let mut facts = PanelFacts::from_passages(request, &retrieval.passages);
        if let (Some(window), Some(first)) = (&context, facts.excerpts.first_mut()) {
            first.text = window.text.clone();
        }

        let panel = self.panel.deliberate(&facts, cancel).await;
        info!(
            turn_id = ctx.turn_id(),
            personas = panel.len(),
            delivered = panel.delivered_count(),
            "panel deliberation finished"
        );

        Ok(LegalFindings {
            query: query.clone(),
            retrieval,
            context,
            panel: Some(panel),
        })
    }
}

// ---------------------------------------------------------------------------
// Admin branch
// ---------------------------------------------------------------------------

/// What the admin branch did.
#[derive(Debug, Clone, Serialize)]
pub struct AdminFindings {
    pub outcome: PlanOutcome,
    /// One entry per plan step, in plan order; empty when nothing ran
    pub results: Vec<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AdminReport>,
}

pub struct AdminBranch {
    planner: AdminPlanner,
    executor: AdminExecutor,
    reporter: AdminReporter,
}

impl AdminBranch {
    pub fn new(planner: AdminPlanner, executor: AdminExecutor, reporter: AdminReporter) -> Self {
        Self {
            planner,
            executor,
            reporter,
        }
    }

    pub fn executor(&self) -> &AdminExecutor {
        &self.executor
    }

    pub async fn run(
        &self,
        request: &str,
        history: &[Message],
        ctx: &OrchestratorContext,
        log: &InvocationLog,
        cancel: &CancellationToken,
    ) -> AppResult<AdminFindings> {
        let outcome = cancellable(cancel, self.planner.plan(request, history))
            .await
            .ok_or_else(|| AppError::internal("turn cancelled before planning finished"))??;

        let plan = match outcome {
            PlanOutcome::Ready { plan } => plan,
            other => {
                info!(turn_id = ctx.turn_id(), "admin plan not runnable, nothing executed");
                return Ok(AdminFindings {
                    outcome: other,
                    results: Vec::new(),
                    report: None,
                });
            }
        };

        info!(
            turn_id = ctx.turn_id(),
            steps = plan.len(),
            writes = plan.has_writes(),
            "admin plan ready"
        );
        let results = self.executor.execute(&plan, ctx, log, cancel).await;

        // Committed writes are reported even when the caller has gone.
        let report = match cancellable(cancel, self.reporter.report(request, &plan, &results)).await {
            Some(report) => report,
            None => AdminReport {
                text: template_report(&plan, &results, has_arabic(request)),
                source: ReportSource::Template,
            },
        };

        Ok(AdminFindings {
            outcome: PlanOutcome::Ready { plan },
            results,
            report: Some(report),
        })
    }
}
