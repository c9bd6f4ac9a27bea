//! Admin Executor
//!
//! Runs plan steps in order through the admin toolset and records one
//! `ExecutionResult` per step, so result N always belongs to step N. A
//! failed step does not stop independent later steps; a step that depends
//! on a failed or skipped step is skipped. Once the turn is cancelled no
//! further step starts, and steps already committed stay committed.

use std::time::Instant;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use counsel_core::OrchestratorContext;
use counsel_tools::{AdminPartition, ExecutionResult, FailureKind, InvocationLog, Toolset};

use super::plan::{PlanStep, ToolCallPlan};

pub struct AdminExecutor {
    toolset: Toolset<AdminPartition>,
}

impl AdminExecutor {
    pub fn new(toolset: Toolset<AdminPartition>) -> Self {
        Self { toolset }
    }

    pub fn toolset(&self) -> &Toolset<AdminPartition> {
        &self.toolset
    }

    pub async fn execute(
        &self,
        plan: &ToolCallPlan,
        ctx: &OrchestratorContext,
        log: &InvocationLog,
        cancel: &CancellationToken,
    ) -> Vec<ExecutionResult> {
        let mut results: Vec<ExecutionResult> = Vec::with_capacity(plan.len());

        for step in plan.steps() {
            if cancel.is_cancelled() {
                warn!(step = step.step, tool = %step.tool, "turn cancelled, step not started");
                results.push(ExecutionResult::skipped(
                    step.step,
                    &step.tool,
                    FailureKind::Cancelled,
                    "cancelled before execution",
                ));
                continue;
            }

            if let Some(blocker) = step
                .depends_on
                .iter()
                .find(|d| {
                    !d.checked_sub(1)
                        .and_then(|i| results.get(i))
                        .map(ExecutionResult::is_success)
                        .unwrap_or(false)
                })
            {
                results.push(ExecutionResult::skipped(
                    step.step,
                    &step.tool,
                    FailureKind::DependencyFailed { step: *blocker },
                    format!("dependency failed (step {})", blocker),
                ));
                continue;
            }

            let args = match resolve_params(step, &results) {
                Ok(args) => args,
                Err(message) => {
                    results.push(ExecutionResult::failed(
                        step.step,
                        &step.tool,
                        FailureKind::NotFound,
                        message,
                        std::time::Duration::ZERO,
                    ));
                    continue;
                }
            };

            let tool_ctx = ctx.create_tool_context(format!("{}-step{}", ctx.turn_id(), step.step));
            let started = Instant::now();
            let result = match self
                .toolset
                .invoke(&step.tool, &tool_ctx, Value::Object(args), log)
                .await
            {
                Ok(output) => ExecutionResult::succeeded(step.step, &step.tool, output, started.elapsed()),
                Err(e) => {
                    warn!(step = step.step, tool = %step.tool, error = %e, "plan step failed");
                    ExecutionResult::failed(
                        step.step,
                        &step.tool,
                        FailureKind::from(&e),
                        e.to_string(),
                        started.elapsed(),
                    )
                }
            };
            results.push(result);
        }

        info!(
            turn_id = ctx.turn_id(),
            steps = results.len(),
            succeeded = results.iter().filter(|r| r.is_success()).count(),
            "admin plan executed"
        );
        results
    }
}

/// Replace `$stepN.field` references with values from earlier outputs.
/// An array output resolves against its first row.
fn resolve_params(step: &PlanStep, results: &[ExecutionResult]) -> Result<Map<String, Value>, String> {
    let mut args = step.params.clone();
    for (key, reference) in step.references() {
        let output = results
            .get(reference.step.wrapping_sub(1))
            .and_then(ExecutionResult::output)
            .ok_or_else(|| format!("step {} produced no output", reference.step))?;
        let row = match output {
            Value::Array(rows) => rows
                .first()
                .ok_or_else(|| format!("step {} returned no rows", reference.step))?,
            other => other,
        };
        let value = row
            .get(&reference.field)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                format!(
                    "step {} output has no {}",
                    reference.step, reference.field
                )
            })?;
        args.insert(key, value);
    }
    Ok(args)
}
