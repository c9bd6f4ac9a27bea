//! Tool Call Plan
//!
//! The ordered list of record operations produced once per turn by the
//! planner. A plan is built by `ToolCallPlan::new` after validation and has
//! no mutators; the executor only reads it.
//!
//! A parameter value of the form `$stepN.field` refers to `field` in the
//! output of step N (1-based, earlier steps only). A step that refers to
//! another depends on it.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use counsel_tools::{EntityKind, OperationKind};

/// A `$stepN.field` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReference {
    pub step: usize,
    pub field: String,
}

fn reference_regex() -> Option<&'static Regex> {
    static REFERENCE: OnceLock<Option<Regex>> = OnceLock::new();
    REFERENCE
        .get_or_init(|| Regex::new(r"^\$step(\d{1,3})\.([A-Za-z_][A-Za-z0-9_]*)$").ok())
        .as_ref()
}

/// Parse a bound value as a step reference.
pub fn parse_reference(value: &Value) -> Option<StepReference> {
    let text = value.as_str()?.trim();
    let caps = reference_regex()?.captures(text)?;
    Some(StepReference {
        step: caps.get(1)?.as_str().parse().ok()?,
        field: caps.get(2)?.as_str().to_string(),
    })
}

/// One planned operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    /// 1-based position in the plan
    pub step: usize,
    pub tool: String,
    pub kind: OperationKind,
    pub entity: EntityKind,
    pub params: Map<String, Value>,
    /// Earlier steps whose success this step needs
    pub depends_on: Vec<usize>,
}

impl PlanStep {
    /// References bound in this step's parameters.
    pub fn references(&self) -> Vec<(String, StepReference)> {
        self.params
            .iter()
            .filter_map(|(k, v)| parse_reference(v).map(|r| (k.clone(), r)))
            .collect()
    }
}

/// An immutable, validated plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallPlan {
    steps: Vec<PlanStep>,
    summary: String,
}

impl ToolCallPlan {
    pub(crate) fn new(steps: Vec<PlanStep>, summary: impl Into<String>) -> Self {
        Self {
            steps,
            summary: summary.into(),
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_writes(&self) -> bool {
        self.steps.iter().any(|s| s.kind.is_write())
    }

    pub fn has_destructive(&self) -> bool {
        self.steps.iter().any(|s| s.kind.is_destructive())
    }
}

/// What the planner concluded for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
    Ready { plan: ToolCallPlan },
    /// Required values were not supplied; nothing runs
    InsufficientInformation { missing: Vec<String>, question: String },
    /// The request maps to no catalogue operation
    Unsupported { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference(&json!("$step2.id")),
            Some(StepReference {
                step: 2,
                field: "id".into()
            })
        );
        assert_eq!(parse_reference(&json!(" $step1.case_id ")).unwrap().field, "case_id");
        assert!(parse_reference(&json!("$step.id")).is_none());
        assert!(parse_reference(&json!("step1.id")).is_none());
        assert!(parse_reference(&json!(12)).is_none());
    }

    #[test]
    fn test_plan_flags() {
        let step = |n: usize, kind: OperationKind| PlanStep {
            step: n,
            tool: format!("{}_client", kind.as_str()),
            kind,
            entity: EntityKind::Client,
            params: Map::new(),
            depends_on: vec![],
        };
        let plan = ToolCallPlan::new(vec![step(1, OperationKind::Query)], "look up");
        assert!(!plan.has_writes());
        let plan = ToolCallPlan::new(
            vec![step(1, OperationKind::Query), step(2, OperationKind::Delete)],
            "remove",
        );
        assert!(plan.has_writes());
        assert!(plan.has_destructive());
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = PlanOutcome::InsufficientInformation {
            missing: vec!["id".into()],
            question: "Which client?".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "insufficient_information");
        assert_eq!(json["missing"][0], "id");
    }
}
