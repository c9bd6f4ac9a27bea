//! Admin Reporter
//!
//! Turns execution results into a reply for the lawyer. The model writes
//! the prose, but its reply is only used when every number in it occurs in
//! the request or the results and every failed or skipped step is
//! mentioned by number. Otherwise, or when the call fails, the report is a
//! fixed template built from the results alone.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use counsel_llm::{LlmProvider, LlmRequestOptions, Message};
use counsel_tools::{ExecutionResult, FailureKind, OperationKind, StepStatus};

use super::plan::{PlanStep, ToolCallPlan};
use crate::services::retrieval::normalize::{has_arabic, prepare_text};

const SYSTEM_PROMPT: &str = "You report the outcome of database operations to a lawyer. \
Write a short reply in the language of the request. State only what the results show: \
do not add names, ids, dates, counts or any other value that is not in them. \
Mention every failed or skipped step by its step number together with its reason, \
in plain words. Do not show raw JSON.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Model,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminReport {
    pub text: String,
    pub source: ReportSource,
}

pub struct AdminReporter {
    provider: Arc<dyn LlmProvider>,
}

impl AdminReporter {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn report(
        &self,
        request: &str,
        plan: &ToolCallPlan,
        results: &[ExecutionResult],
    ) -> AdminReport {
        let evidence = results
            .iter()
            .map(ExecutionResult::to_content)
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!("Request:\n{}\n\nResults:\n{}", request.trim(), evidence);

        let reply = self
            .provider
            .send_message(
                vec![Message::user(prompt)],
                Some(SYSTEM_PROMPT.to_string()),
                vec![],
                LlmRequestOptions::prose("admin.reporter"),
            )
            .await;

        match reply {
            Ok(response) if !response.text().trim().is_empty() => {
                let text = response.text().trim().to_string();
                let grounding = format!("{}\n{}", request, evidence);
                if is_grounded(&text, &grounding, results) {
                    return AdminReport {
                        text,
                        source: ReportSource::Model,
                    };
                }
                warn!("reporter reply failed the grounding check, using template");
            }
            Ok(_) => debug!("reporter returned empty text, using template"),
            Err(e) => warn!(error = %e, "reporter call failed, using template"),
        }

        AdminReport {
            text: template_report(plan, results, has_arabic(request)),
            source: ReportSource::Template,
        }
    }
}

fn number_tokens(text: &str) -> HashSet<String> {
    prepare_text(text)
        .split_whitespace()
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| {
            let trimmed = t.trim_start_matches('0');
            if trimmed.is_empty() { "0" } else { trimmed }.to_string()
        })
        .collect()
}

/// Whether a model reply states only numbers found in the evidence and
/// names every unsuccessful step.
pub fn is_grounded(reply: &str, evidence: &str, results: &[ExecutionResult]) -> bool {
    let reply_numbers = number_tokens(reply);
    let mut allowed = number_tokens(evidence);
    allowed.extend(results.iter().map(|r| r.step().to_string()));
    // "2 of 3 steps" style counts
    allowed.insert(results.len().to_string());
    allowed.insert(results.iter().filter(|r| r.is_success()).count().to_string());

    if let Some(stray) = reply_numbers.iter().find(|n| !allowed.contains(*n)) {
        debug!(number = %stray, "reporter reply contains an ungrounded number");
        return false;
    }
    results
        .iter()
        .filter(|r| !r.is_success())
        .all(|r| reply_numbers.contains(&r.step().to_string()))
}

fn record_label(output: Option<&Value>) -> String {
    output
        .and_then(|o| o.get("id"))
        .and_then(Value::as_i64)
        .map(|id| format!(" #{}", id))
        .unwrap_or_default()
}

fn describe_success(step: &PlanStep, result: &ExecutionResult, arabic: bool) -> String {
    let entity = step.entity.as_str();
    let label = record_label(result.output());
    match (step.kind, arabic) {
        (OperationKind::Query, _) => {
            let count = result
                .output()
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            if arabic {
                format!("تم العثور على {} سجل ({})", count, entity)
            } else {
                format!("found {} {} record(s)", count, entity)
            }
        }
        (OperationKind::Insert, true) => format!("تم إنشاء {}{}", entity, label),
        (OperationKind::Insert, false) => format!("created {}{}", entity, label),
        (OperationKind::Update, true) => format!("تم تحديث {}{}", entity, label),
        (OperationKind::Update, false) => format!("updated {}{}", entity, label),
        (OperationKind::Delete, true) => format!("تم حذف {}{}", entity, label),
        (OperationKind::Delete, false) => format!("deleted {}{}", entity, label),
    }
}

/// Reason shown for a failed or skipped step. The raw error never reaches
/// the reply.
fn describe_failure(result: &ExecutionResult, arabic: bool) -> String {
    let failure = result.failure().unwrap_or(FailureKind::Other);
    if !arabic {
        return failure.describe();
    }
    match failure {
        FailureKind::NotFound => "السجل المشار إليه غير موجود".to_string(),
        FailureKind::InvalidValue => "قيمة في الطلب ناقصة أو غير صحيحة".to_string(),
        FailureKind::DependencyFailed { step } => {
            format!("تعتمد على الخطوة {} التي لم تنجح", step)
        }
        FailureKind::Cancelled => "أُلغي الطلب قبل تنفيذها".to_string(),
        FailureKind::Other => "تعذر إتمام العملية".to_string(),
    }
}

/// Deterministic report built from the results alone.
pub fn template_report(plan: &ToolCallPlan, results: &[ExecutionResult], arabic: bool) -> String {
    let mut lines = vec![if arabic {
        "نتيجة العمليات المطلوبة:".to_string()
    } else {
        "Here is what happened:".to_string()
    }];

    for (step, result) in plan.steps().iter().zip(results) {
        let detail = match result.status() {
            StepStatus::Succeeded => describe_success(step, result, arabic),
            StepStatus::Failed if arabic => format!("فشلت: {}", describe_failure(result, true)),
            StepStatus::Failed => format!("failed: {}", describe_failure(result, false)),
            StepStatus::Skipped if arabic => format!("لم تُنفذ: {}", describe_failure(result, true)),
            StepStatus::Skipped => format!("skipped: {}", describe_failure(result, false)),
        };
        let marker = match result.status() {
            StepStatus::Succeeded => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "-",
        };
        let step_word = if arabic { "الخطوة" } else { "Step" };
        lines.push(format!(
            "{} {} {} ({}): {}",
            marker,
            step_word,
            result.step(),
            result.tool(),
            detail
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use counsel_llm::{LlmError, LlmResponse, LlmResult, ProviderConfig, ToolDefinition};
    use counsel_tools::EntityKind;
    use serde_json::{json, Map};
    use std::time::Duration;

    struct Fixed {
        reply: Option<String>,
        config: ProviderConfig,
    }

    #[async_trait]
    impl LlmProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn model(&self) -> &str {
            "test"
        }
        fn supports_tools(&self) -> bool {
            false
        }
        async fn send_message(
            &self,
            _messages: Vec<Message>,
            _system: Option<String>,
            _tools: Vec<ToolDefinition>,
            _options: LlmRequestOptions,
        ) -> LlmResult<LlmResponse> {
            match &self.reply {
                Some(text) => Ok(LlmResponse::from_text(text.clone(), "test")),
                None => Err(LlmError::ProviderUnavailable {
                    message: "down".into(),
                }),
            }
        }
        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }
        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    fn reporter(reply: Option<&str>) -> AdminReporter {
        AdminReporter::new(Arc::new(Fixed {
            reply: reply.map(str::to_string),
            config: ProviderConfig::default(),
        }))
    }

    fn fixture() -> (ToolCallPlan, Vec<ExecutionResult>) {
        let step = |n: usize, kind: OperationKind, entity: EntityKind| PlanStep {
            step: n,
            tool: format!("{}_{}", kind.as_str(), entity.as_str()),
            kind,
            entity,
            params: Map::new(),
            depends_on: vec![],
        };
        let plan = ToolCallPlan::new(
            vec![
                step(1, OperationKind::Update, EntityKind::Case),
                step(2, OperationKind::Insert, EntityKind::Hearing),
                step(3, OperationKind::Insert, EntityKind::Hearing),
            ],
            "",
        );
        let results = vec![
            ExecutionResult::succeeded(1, "update_case", json!({"id": 7, "status": "closed"}), Duration::ZERO),
            ExecutionResult::failed(
                2,
                "insert_hearing",
                FailureKind::NotFound,
                "Not found: case 99 referenced by hearing.case_id does not exist",
                Duration::ZERO,
            ),
            ExecutionResult::succeeded(3, "insert_hearing", json!({"id": 12, "case_id": 7}), Duration::ZERO),
        ];
        (plan, results)
    }

    #[tokio::test]
    async fn test_grounded_model_reply_is_used() {
        let (plan, results) = fixture();
        let text = "Case 7 is now closed and hearing 12 was added. Step 2 failed: case 99 was not found.";
        let report = reporter(Some(text))
            .report("close case 7, add hearings for cases 99 and 7", &plan, &results)
            .await;
        assert_eq!(report.source, ReportSource::Model);
        assert_eq!(report.text, text);
    }

    #[tokio::test]
    async fn test_invented_number_falls_back_to_template() {
        let (plan, results) = fixture();
        let report = reporter(Some("Closed case 7 and added 5 hearings. Step 2 failed."))
            .report("close case 7", &plan, &results)
            .await;
        assert_eq!(report.source, ReportSource::Template);
    }

    #[tokio::test]
    async fn test_omitted_failure_falls_back_to_template() {
        let (plan, results) = fixture();
        let report = reporter(Some("Case 7 closed and hearing 12 added."))
            .report("close case 7", &plan, &results)
            .await;
        assert_eq!(report.source, ReportSource::Template);
        assert!(report
            .text
            .contains("✗ Step 2 (insert_hearing): failed: the referenced record does not exist"));
        assert!(!report.text.contains("Not found:"));
        assert!(!report.text.contains("hearing.case_id"));
        assert!(report.text.contains("✓ Step 1 (update_case): updated case #7"));
        assert!(report.text.contains("✓ Step 3 (insert_hearing): created hearing #12"));
    }

    #[tokio::test]
    async fn test_provider_failure_uses_arabic_template() {
        let (plan, results) = fixture();
        let report = reporter(None).report("أغلق القضية 7", &plan, &results).await;
        assert_eq!(report.source, ReportSource::Template);
        assert!(report.text.contains("✗ الخطوة 2 (insert_hearing): فشلت: السجل المشار إليه غير موجود"));
        assert!(!report.text.contains("Not found:"));
    }

    #[test]
    fn test_skipped_steps_show_reason_category() {
        let (plan, _) = fixture();
        let results = vec![
            ExecutionResult::failed(
                1,
                "update_case",
                FailureKind::Other,
                "Execution error: SQLite error: database is locked",
                Duration::ZERO,
            ),
            ExecutionResult::skipped(
                2,
                "insert_hearing",
                FailureKind::DependencyFailed { step: 1 },
                "dependency failed (step 1)",
            ),
            ExecutionResult::skipped(3, "insert_hearing", FailureKind::Cancelled, "cancelled before execution"),
        ];
        let text = template_report(&plan, &results, false);
        assert!(text.contains("✗ Step 1 (update_case): failed: the operation could not be completed"));
        assert!(text.contains("- Step 2 (insert_hearing): skipped: depends on step 1, which did not succeed"));
        assert!(text.contains("- Step 3 (insert_hearing): skipped: the request was cancelled before this step ran"));
        assert!(!text.contains("SQLite"));
    }

    #[test]
    fn test_model_prompt_carries_no_raw_error() {
        let (_, results) = fixture();
        let evidence: Vec<String> = results.iter().map(ExecutionResult::to_content).collect();
        assert!(evidence.iter().all(|line| !line.contains("hearing.case_id")));
        assert!(evidence[1].contains("the referenced record does not exist"));
    }
}
