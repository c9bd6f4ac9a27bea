//! Execution Results
//!
//! Per-step outcome of an administrative plan. Created by the admin
//! executor, read by the reporter and the client display layer, and never
//! mutated once built: fields are private and there are no setters.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use counsel_core::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Why a step did not succeed, in terms a lawyer can be shown. The raw
/// error text stays in `ExecutionResult::error` for logs and metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// A record the step names or references does not exist
    NotFound,
    /// A parameter was missing, malformed or out of range
    InvalidValue,
    /// An earlier step this one relies on did not succeed
    DependencyFailed { step: usize },
    /// The turn was cancelled before the step started
    Cancelled,
    Other,
}

impl FailureKind {
    /// Short English description used in reasoning-call prompts.
    pub fn describe(&self) -> String {
        match self {
            FailureKind::NotFound => "the referenced record does not exist".to_string(),
            FailureKind::InvalidValue => "a value in the request is missing or invalid".to_string(),
            FailureKind::DependencyFailed { step } => {
                format!("depends on step {}, which did not succeed", step)
            }
            FailureKind::Cancelled => "the request was cancelled before this step ran".to_string(),
            FailureKind::Other => "the operation could not be completed".to_string(),
        }
    }
}

impl From<&CoreError> for FailureKind {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NotFound(_) => FailureKind::NotFound,
            CoreError::Validation(_) | CoreError::Serialization(_) => FailureKind::InvalidValue,
            _ => FailureKind::Other,
        }
    }
}

/// Result of one plan step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// 1-based plan position this result belongs to.
    step: usize,
    tool: String,
    status: StepStatus,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureKind>,
    elapsed_ms: u64,
}

impl ExecutionResult {
    /// A step that ran and returned output.
    pub fn succeeded(step: usize, tool: impl Into<String>, output: Value, elapsed: Duration) -> Self {
        Self {
            step,
            tool: tool.into(),
            status: StepStatus::Succeeded,
            success: true,
            output: Some(output),
            error: None,
            failure: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// A step that ran and failed.
    pub fn failed(
        step: usize,
        tool: impl Into<String>,
        failure: FailureKind,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            step,
            tool: tool.into(),
            status: StepStatus::Failed,
            success: false,
            output: None,
            error: Some(error.into()),
            failure: Some(failure),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    /// A step that never ran.
    pub fn skipped(
        step: usize,
        tool: impl Into<String>,
        failure: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            step,
            tool: tool.into(),
            status: StepStatus::Skipped,
            success: false,
            output: None,
            error: Some(reason.into()),
            failure: Some(failure),
            elapsed_ms: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    /// Error message for failed steps, skip reason for skipped ones.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Category of a failed or skipped step.
    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Compact single-line rendering for a reasoning-call prompt. Failures
    /// are described by category, never by the raw error text.
    pub fn to_content(&self) -> String {
        let failure = || self.failure.unwrap_or(FailureKind::Other).describe();
        match self.status {
            StepStatus::Succeeded => format!(
                "step {} {}: succeeded: {}",
                self.step,
                self.tool,
                self.output
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default()
            ),
            StepStatus::Failed => format!("step {} {}: failed: {}", self.step, self.tool, failure()),
            StepStatus::Skipped => format!("step {} {}: skipped: {}", self.step, self.tool, failure()),
        }
    }
}
