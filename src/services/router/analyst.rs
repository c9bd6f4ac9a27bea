//! Analyst
//!
//! First router stage. Classifies the message with one reasoning call that
//! has no tool access. Classification never fails the turn: an unusable
//! reply is recorded as `Ambiguous` with zero confidence, which the
//! strategist sends down the direct path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use counsel_llm::{request_json, LlmProvider, LlmRequestOptions, Message};

const ANALYST_SYSTEM_PROMPT: &str = r#"You are the intake analyst of a law office assistant. Classify the lawyer's latest message.

Intents:
- "legal_research": a question about statutes, articles, legal rules or how the law applies to facts
- "admin_action": a request to look up, create, change or delete office records (clients, cases, hearings, tasks)
- "direct_answer": conversation or general questions that need neither statutes nor office records
- "trivial": greetings, thanks or acknowledgments
- "ambiguous": you cannot tell which of the above applies

Respond with ONLY valid JSON matching this schema:
{
  "intent": "legal_research" | "admin_action" | "direct_answer" | "trivial" | "ambiguous",
  "confidence": 0.0-1.0,
  "reasoning": "one sentence"
}

No markdown fences, no explanatory text. Just the raw JSON object."#;

/// User intent types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Greeting, thanks, acknowledgment
    Trivial,
    LegalResearch,
    AdminAction,
    /// Information-only reply from the model
    DirectAnswer,
    Ambiguous,
}

impl Intent {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "trivial" => Intent::Trivial,
            "legal_research" | "legal" => Intent::LegalResearch,
            "admin_action" | "admin" => Intent::AdminAction,
            "direct_answer" | "direct" => Intent::DirectAnswer,
            _ => Intent::Ambiguous,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Trivial => write!(f, "trivial"),
            Intent::LegalResearch => write!(f, "legal_research"),
            Intent::AdminAction => write!(f, "admin_action"),
            Intent::DirectAnswer => write!(f, "direct_answer"),
            Intent::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// Who produced the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Gatekeeper,
    Analyst,
    /// The analyst call failed or was cancelled
    Fallback,
}

/// Result of intent classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentDecision {
    pub intent: Intent,
    /// Confidence in the classification (0.0 - 1.0)
    pub confidence: f32,
    pub reasoning: String,
    pub source: DecisionSource,
}

impl IntentDecision {
    pub fn gatekeeper() -> Self {
        Self {
            intent: Intent::Trivial,
            confidence: 1.0,
            reasoning: "matched a fast-path rule".to_string(),
            source: DecisionSource::Gatekeeper,
        }
    }

    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            intent: Intent::Ambiguous,
            confidence: 0.0,
            reasoning: reason.into(),
            source: DecisionSource::Fallback,
        }
    }

    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

pub struct Analyst {
    provider: Arc<dyn LlmProvider>,
}

impl Analyst {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub async fn classify(&self, request: &str, history: &[Message]) -> IntentDecision {
        let mut messages = history.to_vec();
        messages.push(Message::user(request));

        match request_json::<RawIntent>(
            self.provider.as_ref(),
            ANALYST_SYSTEM_PROMPT,
            messages,
            LlmRequestOptions::json("router.analyst"),
        )
        .await
        {
            Ok(raw) => {
                let decision = IntentDecision {
                    intent: Intent::parse(&raw.intent),
                    confidence: raw.confidence.clamp(0.0, 1.0),
                    reasoning: raw.reasoning,
                    source: DecisionSource::Analyst,
                };
                debug!(intent = %decision.intent, confidence = decision.confidence, "analyst classified message");
                decision
            }
            Err(e) => {
                warn!(error = %e, "analyst call failed, treating message as ambiguous");
                IntentDecision::fallback("classification unavailable")
            }
        }
    }
}
