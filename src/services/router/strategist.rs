//! Strategist
//!
//! Second router stage. Maps the intent to exactly one execution path and,
//! for legal research, composes the retrieval query. Pure and
//! deterministic; no reasoning call.

use serde::Serialize;

use super::analyst::{Intent, IntentDecision};
use crate::models::chat::ChatMode;
use crate::services::gatekeeper::FastResult;
use crate::services::retrieval::normalize::prepare_text;
use crate::services::retrieval::numerals::{canonical_citation_query, extract_citations, Citation};

/// Retrieval inputs for the legal branch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegalQuery {
    /// Drives exact header matching. Canonical citation form when the
    /// message cites an article, otherwise the message itself.
    pub query_text: String,
    pub semantic_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub citations: Vec<Citation>,
}

impl LegalQuery {
    pub fn compose(request: &str, country: Option<&str>) -> Self {
        let citations = extract_citations(&prepare_text(request));
        let query_text = canonical_citation_query(request, &citations)
            .unwrap_or_else(|| request.trim().to_string());
        Self {
            query_text,
            semantic_query: request.trim().to_string(),
            country: country
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            citations,
        }
    }
}

/// Why a turn took the direct path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectReason {
    /// The analyst asked for it
    Requested,
    Ambiguous,
    LowConfidence,
    /// The branch the intent needs is not allowed in this chat mode
    ModeRestricted,
    /// Classified trivial by the model rather than by a fast-path rule
    Conversational,
}

/// The single path a turn takes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum ExecutionPath {
    Fast { result: FastResult },
    Legal { query: LegalQuery },
    Admin,
    Direct { reason: DirectReason },
}

impl ExecutionPath {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionPath::Fast { .. } => "fast",
            ExecutionPath::Legal { .. } => "legal",
            ExecutionPath::Admin => "admin",
            ExecutionPath::Direct { .. } => "direct",
        }
    }
}

pub struct Strategist {
    min_confidence: f32,
}

impl Strategist {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn select(
        &self,
        decision: &IntentDecision,
        mode: ChatMode,
        request: &str,
        country: Option<&str>,
    ) -> ExecutionPath {
        let direct = |reason| ExecutionPath::Direct { reason };
        match decision.intent {
            Intent::Ambiguous => direct(DirectReason::Ambiguous),
            Intent::DirectAnswer => direct(DirectReason::Requested),
            Intent::Trivial => direct(DirectReason::Conversational),
            _ if !decision.is_confident(self.min_confidence) => direct(DirectReason::LowConfidence),
            Intent::LegalResearch if mode == ChatMode::Admin => direct(DirectReason::ModeRestricted),
            Intent::AdminAction if mode == ChatMode::Research => direct(DirectReason::ModeRestricted),
            Intent::LegalResearch => ExecutionPath::Legal {
                query: LegalQuery::compose(request, country),
            },
            Intent::AdminAction => ExecutionPath::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::router::analyst::DecisionSource;

    fn decision(intent: Intent, confidence: f32) -> IntentDecision {
        IntentDecision {
            intent,
            confidence,
            reasoning: String::new(),
            source: DecisionSource::Analyst,
        }
    }

    #[test]
    fn test_legal_query_uses_canonical_citation() {
        let query = LegalQuery::compose("ما نص المادة ثلاثمائة وثمانية وستون بشأن الهبة؟", Some("jordan"));
        assert_eq!(query.query_text, "المادة 368");
        assert_eq!(query.citations, vec![Citation::Article(368)]);
        assert!(query.semantic_query.contains("الهبة"));
        assert_eq!(query.country.as_deref(), Some("jordan"));

        let plain = LegalQuery::compose("rules on gifts of real estate", None);
        assert_eq!(plain.query_text, "rules on gifts of real estate");
        assert!(plain.citations.is_empty());
    }

    #[test]
    fn test_ambiguous_and_low_confidence_go_direct() {
        let strategist = Strategist::new(0.55);
        assert_eq!(
            strategist.select(&decision(Intent::Ambiguous, 0.9), ChatMode::Auto, "x", None),
            ExecutionPath::Direct { reason: DirectReason::Ambiguous }
        );
        assert_eq!(
            strategist.select(&decision(Intent::AdminAction, 0.3), ChatMode::Auto, "x", None),
            ExecutionPath::Direct { reason: DirectReason::LowConfidence }
        );
    }

    #[test]
    fn test_mode_restricts_branches() {
        let strategist = Strategist::new(0.55);
        assert_eq!(
            strategist.select(&decision(Intent::AdminAction, 0.9), ChatMode::Research, "x", None),
            ExecutionPath::Direct { reason: DirectReason::ModeRestricted }
        );
        assert_eq!(
            strategist.select(&decision(Intent::LegalResearch, 0.9), ChatMode::Admin, "x", None),
            ExecutionPath::Direct { reason: DirectReason::ModeRestricted }
        );
        assert_eq!(
            strategist.select(&decision(Intent::AdminAction, 0.9), ChatMode::Admin, "x", None),
            ExecutionPath::Admin
        );
        assert_eq!(
            strategist
                .select(&decision(Intent::LegalResearch, 0.9), ChatMode::Auto, "gift law", None)
                .name(),
            "legal"
        );
    }
}
