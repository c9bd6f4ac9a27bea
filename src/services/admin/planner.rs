//! Admin Planner
//!
//! Maps an administrative request to a `ToolCallPlan` over the generated
//! catalogue. The model proposes; this module decides. A proposal is only
//! accepted when every step names a catalogue operation, binds only
//! parameters that operation accepts, supplies every required value, and
//! refers only to earlier steps. Record ids and foreign keys must appear in
//! the lawyer's own words, so a guessed id counts as missing. A delete must
//! be marked destructive by the model and asked for with an explicit verb.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use counsel_llm::{
    parse_json_reply, LlmError, LlmProvider, LlmRequestOptions, LlmResponse, Message,
};
use counsel_tools::catalogue::{ID_PARAM, TENANT_KEYS};
use counsel_tools::{describe_tools, parse_tool_calls, AdminCatalogue, OperationDescriptor, OperationKind};

use super::plan::{parse_reference, PlanOutcome, PlanStep, ToolCallPlan};
use crate::services::retrieval::normalize::{has_arabic, normalize_text};
use crate::services::retrieval::numerals::words_to_digits;
use crate::utils::error::{AppError, AppResult};

/// Pseudo-parameter reported when a delete was not explicitly requested.
pub const DELETE_CONFIRMATION: &str = "delete_confirmation";

const DELETE_VERBS: &[&str] = &[
    "delete", "remove", "erase", "حذف", "احذف", "احذفي", "امسح", "مسح", "ازل", "ازاله",
];

#[derive(Debug, Default, Deserialize)]
struct RawPlan {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    missing: Vec<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    tool: String,
    #[serde(default, alias = "arguments", alias = "parameters")]
    params: Map<String, Value>,
    #[serde(default)]
    depends_on: Vec<usize>,
    #[serde(default)]
    destructive: bool,
}

impl RawPlan {
    fn from_calls(calls: impl Iterator<Item = (String, Value)>) -> Self {
        let steps = calls
            .map(|(tool, arguments)| RawStep {
                tool,
                params: arguments.as_object().cloned().unwrap_or_default(),
                depends_on: vec![],
                destructive: false,
            })
            .collect();
        Self {
            status: Some("ready".to_string()),
            steps,
            ..Self::default()
        }
    }
}

pub struct AdminPlanner {
    provider: Arc<dyn LlmProvider>,
    catalogue: Arc<AdminCatalogue>,
    max_steps: usize,
}

impl AdminPlanner {
    pub fn new(provider: Arc<dyn LlmProvider>, catalogue: Arc<AdminCatalogue>, max_steps: usize) -> Self {
        Self {
            provider,
            catalogue,
            max_steps,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You plan database operations for a law office assistant. The office is fixed by the \
             session; never add office_id, tenant_id or lawyer_id.\n\n\
             Available operations:\n\n{tools}\
             Reply with one JSON object only, in one of these shapes:\n\
             {{\"status\": \"ready\", \"summary\": \"...\", \"steps\": [{{\"tool\": \"update_case\", \
             \"params\": {{\"id\": 7, \"status\": \"closed\"}}, \"depends_on\": [], \"destructive\": false}}]}}\n\
             {{\"status\": \"insufficient_information\", \"missing\": [\"client id\"], \"question\": \"...\"}}\n\
             {{\"status\": \"unsupported\", \"reason\": \"...\"}}\n\n\
             Rules:\n\
             - Never invent ids, names, dates or any other value the user did not give. If a required \
             value is missing, answer insufficient_information.\n\
             - To use the output of an earlier step write \"$stepN.field\", e.g. \"$step1.id\".\n\
             - Set \"destructive\": true on every delete step, and plan a delete only when the user \
             explicitly asks to delete or remove something.\n\
             - At most {max} steps.",
            tools = describe_tools(&self.catalogue.tool_definitions()),
            max = self.max_steps,
        )
    }

    /// Produce a plan, or an explicit reason why none can run.
    ///
    /// Errors only when the model gave no usable answer at all.
    pub async fn plan(&self, request: &str, history: &[Message]) -> AppResult<PlanOutcome> {
        let system = self.system_prompt();
        let mut messages = history.to_vec();
        messages.push(Message::user(request));

        let response = self
            .provider
            .send_message(
                messages.clone(),
                Some(system.clone()),
                vec![],
                LlmRequestOptions::json("admin.planner"),
            )
            .await?;

        let raw = match interpret(&response) {
            Some(raw) => raw,
            None => {
                debug!("planner reply unusable, retrying with repair prompt");
                messages.push(Message::assistant(response.text()));
                messages.push(Message::user(
                    "Your previous reply was not a valid plan. Reply with the JSON plan object only.",
                ));
                let retry = self
                    .provider
                    .send_message(
                        messages,
                        Some(system),
                        vec![],
                        LlmRequestOptions::json("admin.planner"),
                    )
                    .await?;
                interpret(&retry).ok_or_else(|| {
                    AppError::Llm(LlmError::ParseError {
                        message: "planner reply was not a plan after retry".to_string(),
                    })
                })?
            }
        };

        let grounding: Vec<String> = history
            .iter()
            .map(Message::text_content)
            .chain(std::iter::once(request.to_string()))
            .collect();
        let outcome = self.validate(raw, request, &grounding.join("\n"));
        match &outcome {
            PlanOutcome::Ready { plan } => info!(steps = plan.len(), writes = plan.has_writes(), "admin plan ready"),
            PlanOutcome::InsufficientInformation { missing, .. } => {
                info!(missing = ?missing, "admin plan needs more information")
            }
            PlanOutcome::Unsupported { reason } => info!(reason = %reason, "admin request unsupported"),
        }
        Ok(outcome)
    }

    fn validate(&self, raw: RawPlan, request: &str, grounding_text: &str) -> PlanOutcome {
        let arabic = has_arabic(request);
        match raw.status.as_deref().map(str::trim) {
            Some("insufficient_information") => {
                let missing = if raw.missing.is_empty() {
                    vec!["details".to_string()]
                } else {
                    raw.missing
                };
                let question = raw
                    .question
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or_else(|| missing_question(&missing, arabic));
                return PlanOutcome::InsufficientInformation { missing, question };
            }
            Some("unsupported") => {
                return PlanOutcome::Unsupported {
                    reason: raw
                        .reason
                        .unwrap_or_else(|| "no matching operation".to_string()),
                }
            }
            _ => {}
        }

        if raw.steps.is_empty() {
            return PlanOutcome::Unsupported {
                reason: "no matching operation".to_string(),
            };
        }
        if raw.steps.len() > self.max_steps {
            return PlanOutcome::Unsupported {
                reason: format!(
                    "the request needs {} operations, more than the {} allowed per message",
                    raw.steps.len(),
                    self.max_steps
                ),
            };
        }

        let grounded_numbers = number_tokens(grounding_text);
        let delete_requested = explicit_delete(request);
        let mut steps = Vec::with_capacity(raw.steps.len());
        let mut missing: Vec<String> = Vec::new();
        let mut unconfirmed_delete = false;

        for (i, raw_step) in raw.steps.into_iter().enumerate() {
            let n = i + 1;
            let Some(descriptor) = self.catalogue.get(raw_step.tool.trim()) else {
                return PlanOutcome::Unsupported {
                    reason: format!("{} is not an available operation", raw_step.tool),
                };
            };

            let mut params = raw_step.params;
            for key in TENANT_KEYS {
                if params.remove(*key).is_some() {
                    warn!(step = n, key = *key, "stripped tenant key from planned step");
                }
            }

            let unknown = descriptor.unknown_params(&params);
            if !unknown.is_empty() {
                return PlanOutcome::Unsupported {
                    reason: format!("{} does not accept {}", descriptor.name, unknown.join(", ")),
                };
            }

            let mut depends_on = raw_step.depends_on;
            for value in params.values() {
                if let Some(reference) = parse_reference(value) {
                    depends_on.push(reference.step);
                }
            }
            depends_on.sort_unstable();
            depends_on.dedup();
            if let Some(bad) = depends_on.iter().find(|d| **d == 0 || **d >= n) {
                return PlanOutcome::Unsupported {
                    reason: format!("step {} depends on step {}, which does not run before it", n, bad),
                };
            }

            for param in descriptor.missing_params(&params) {
                missing.push(format!("{} {}", descriptor.entity, param));
            }
            for param in ungrounded_ids(descriptor, &mut params, &grounded_numbers) {
                missing.push(format!("{} {}", descriptor.entity, param));
            }

            if descriptor.kind == OperationKind::Delete && !(raw_step.destructive && delete_requested) {
                unconfirmed_delete = true;
            }

            steps.push(PlanStep {
                step: n,
                tool: descriptor.name.clone(),
                kind: descriptor.kind,
                entity: descriptor.entity,
                params,
                depends_on,
            });
        }

        if !missing.is_empty() {
            let mut seen = HashSet::new();
            missing.retain(|m| seen.insert(m.clone()));
            let question = missing_question(&missing, arabic);
            return PlanOutcome::InsufficientInformation { missing, question };
        }

        if unconfirmed_delete {
            let question = if arabic {
                "هذا الطلب يتضمن حذفاً نهائياً لسجل. هل تريد الحذف فعلاً؟ اطلبه صراحة (مثال: احذف العميل رقم 5)."
            } else {
                "This would permanently delete a record. If that is what you want, ask for it explicitly (e.g. \"delete client 5\")."
            };
            return PlanOutcome::InsufficientInformation {
                missing: vec![DELETE_CONFIRMATION.to_string()],
                question: question.to_string(),
            };
        }

        let summary = raw.summary.unwrap_or_default();
        PlanOutcome::Ready {
            plan: ToolCallPlan::new(steps, summary),
        }
    }
}

fn interpret(response: &LlmResponse) -> Option<RawPlan> {
    if response.has_tool_calls() {
        return Some(RawPlan::from_calls(
            response
                .tool_calls
                .iter()
                .map(|c| (c.name.clone(), c.arguments.clone())),
        ));
    }
    let text = response.text();
    if let Ok(raw) = parse_json_reply::<RawPlan>(text) {
        if raw.status.is_some() || !raw.steps.is_empty() {
            return Some(raw);
        }
    }
    let calls = parse_tool_calls(text);
    if !calls.is_empty() {
        return Some(RawPlan::from_calls(
            calls.into_iter().map(|c| (c.tool_name, c.arguments)),
        ));
    }
    None
}

fn missing_question(missing: &[String], arabic: bool) -> String {
    if arabic {
        format!("أحتاج إلى المعلومات التالية قبل التنفيذ: {}.", missing.join("، "))
    } else {
        format!("I need the following before I can proceed: {}.", missing.join(", "))
    }
}

/// Normalized words that introduce a record number ("رقم خمسة", "id five").
const ID_CUES: &[&str] = &["رقم", "برقم", "ورقم", "الرقم", "بالرقم", "id", "number"];

/// Numbers the lawyer wrote as an identifier: every digit token, plus a
/// spelled-out number only when it follows an id cue. "delete one client"
/// grounds nothing.
fn number_tokens(text: &str) -> HashSet<String> {
    let normalized = normalize_text(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    let mut numbers: HashSet<String> = tokens
        .iter()
        .filter(|t| is_digits(t))
        .map(|t| t.trim_start_matches('0').to_string())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if !ID_CUES.contains(token) {
            continue;
        }
        let rewritten = words_to_digits(&tokens[i + 1..].join(" "));
        if let Some(first) = rewritten.split_whitespace().next().filter(|t| is_digits(t)) {
            numbers.insert(first.trim_start_matches('0').to_string());
        }
    }
    numbers
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn explicit_delete(request: &str) -> bool {
    normalize_text(request).split_whitespace().any(|token| {
        let token = token
            .strip_prefix('و')
            .or_else(|| token.strip_prefix('ف'))
            .filter(|rest| rest.chars().count() >= 2)
            .unwrap_or(token);
        DELETE_VERBS
            .iter()
            .any(|verb| token == *verb || (token.starts_with(verb) && has_arabic(verb)))
    })
}

/// Literal ids and foreign keys the lawyer never mentioned. They are
/// removed from `params` and reported by name.
fn ungrounded_ids(
    descriptor: &OperationDescriptor,
    params: &mut Map<String, Value>,
    grounded: &HashSet<String>,
) -> Vec<String> {
    let id_like: Vec<String> = params
        .keys()
        .filter(|k| k.as_str() == ID_PARAM || (k.ends_with("_id") && descriptor.accepted.contains(k)))
        .cloned()
        .collect();

    let mut ungrounded = Vec::new();
    for key in id_like {
        let literal = match params.get(&key) {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if parse_reference(&Value::String(s.clone())).is_none() => {
                s.trim().to_string()
            }
            _ => continue,
        };
        if literal.is_empty() {
            continue;
        }
        let normalized = literal.trim_start_matches('0').to_string();
        if !grounded.contains(&normalized) {
            debug!(param = %key, value = %literal, "dropping id the user never mentioned");
            params.remove(&key);
            ungrounded.push(key);
        }
    }
    ungrounded
}
