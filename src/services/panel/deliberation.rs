//! Deliberation
//!
//! Fan-out / fan-in over the configured personas. Every persona gets the
//! same rendered facts and one reasoning call without tools; none sees
//! another's output. Each call is bounded by the persona timeout and by
//! the turn's cancellation token, and a persona that fails, times out or
//! is cancelled is recorded as unavailable. The report always holds one
//! entry per persona.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use counsel_llm::{request_json, LlmProvider, LlmRequestOptions, Message};

use super::persona::{Persona, PersonaRegistry};
use crate::models::settings::PanelSettings;
use crate::services::retrieval::Passage;
use crate::utils::error::{AppError, AppResult};

const MAX_EXCERPT_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactExcerpt {
    pub header: String,
    pub source_title: String,
    pub text: String,
}

/// The retrieved facts every persona deliberates over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelFacts {
    pub question: String,
    pub excerpts: Vec<FactExcerpt>,
}

impl PanelFacts {
    pub fn from_passages(question: impl Into<String>, passages: &[Passage]) -> Self {
        Self {
            question: question.into(),
            excerpts: passages
                .iter()
                .map(|p| FactExcerpt {
                    header: p.header.clone(),
                    source_title: p.source_title.clone(),
                    text: truncate(&p.content, MAX_EXCERPT_CHARS),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    /// The single user message each persona receives.
    pub fn render(&self) -> String {
        let mut out = format!("Question:\n{}\n\nStatute excerpts:\n", self.question.trim());
        for (i, excerpt) in self.excerpts.iter().enumerate() {
            out.push_str(&format!(
                "[{}] {} ({})\n{}\n\n",
                i + 1,
                excerpt.header,
                excerpt.source_title,
                excerpt.text
            ));
        }
        out
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}

// ---------------------------------------------------------------------------
// Opinions
// ---------------------------------------------------------------------------

/// One persona's view. `rationale` stays in metadata; `statement` may be
/// quoted to the lawyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub rationale: String,
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersonaOutcome {
    Delivered {
        opinion: Opinion,
        elapsed_ms: u64,
    },
    Unavailable {
        reason: String,
    },
}

impl PersonaOutcome {
    pub fn opinion(&self) -> Option<&Opinion> {
        match self {
            PersonaOutcome::Delivered { opinion, .. } => Some(opinion),
            PersonaOutcome::Unavailable { .. } => None,
        }
    }
}

/// Panel output keyed by persona id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelReport {
    pub opinions: BTreeMap<String, PersonaOutcome>,
}

impl PanelReport {
    pub fn len(&self) -> usize {
        self.opinions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opinions.is_empty()
    }

    pub fn delivered_count(&self) -> usize {
        self.opinions.values().filter(|o| o.opinion().is_some()).count()
    }

    /// Delivered opinions as `(persona_id, opinion)`.
    pub fn delivered(&self) -> impl Iterator<Item = (&str, &Opinion)> {
        self.opinions
            .iter()
            .filter_map(|(id, o)| o.opinion().map(|op| (id.as_str(), op)))
    }

    pub fn unavailable(&self) -> Vec<&str> {
        self.opinions
            .iter()
            .filter(|(_, o)| o.opinion().is_none())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// DeliberationPanel
// ---------------------------------------------------------------------------

pub struct DeliberationPanel {
    provider: Arc<dyn LlmProvider>,
    personas: Vec<Persona>,
    persona_timeout: Duration,
}

impl DeliberationPanel {
    pub fn new(provider: Arc<dyn LlmProvider>, personas: Vec<Persona>, persona_timeout: Duration) -> Self {
        Self {
            provider,
            personas,
            persona_timeout,
        }
    }

    /// Build from config. Unknown persona ids are a configuration error.
    pub fn from_settings(provider: Arc<dyn LlmProvider>, settings: &PanelSettings) -> AppResult<Self> {
        let (personas, unknown) = PersonaRegistry::resolve(&settings.personas);
        if !unknown.is_empty() {
            return Err(AppError::config(format!(
                "unknown panel personas: {}",
                unknown.join(", ")
            )));
        }
        if personas.is_empty() {
            return Err(AppError::config("panel needs at least one persona"));
        }
        Ok(Self::new(
            provider,
            personas,
            Duration::from_secs(settings.persona_timeout_secs),
        ))
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    /// Ask every persona in parallel and wait for all of them.
    pub async fn deliberate(&self, facts: &PanelFacts, cancel: &CancellationToken) -> PanelReport {
        let rendered = facts.render();
        let started = Instant::now();

        let calls = self
            .personas
            .iter()
            .map(|persona| self.ask(persona, &rendered, cancel));
        let outcomes = join_all(calls).await;

        let report = PanelReport {
            opinions: self
                .personas
                .iter()
                .map(|p| p.role.id().to_string())
                .zip(outcomes)
                .collect(),
        };
        info!(
            personas = report.len(),
            delivered = report.delivered_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "panel deliberation finished"
        );
        report
    }

    async fn ask(&self, persona: &Persona, facts: &str, cancel: &CancellationToken) -> PersonaOutcome {
        let id = persona.role.id();
        let system = persona.system_prompt();
        let mut options = LlmRequestOptions::json(format!("panel.{}", id));
        options.temperature_override = Some(persona.temperature);
        let started = Instant::now();

        let call = request_json::<Opinion>(
            self.provider.as_ref(),
            &system,
            vec![Message::user(facts)],
            options,
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(persona = id, "persona call cancelled");
                return PersonaOutcome::Unavailable { reason: "cancelled".to_string() };
            }
            timed = tokio::time::timeout(self.persona_timeout, call) => timed,
        };

        match result {
            Ok(Ok(opinion)) if !opinion.statement.trim().is_empty() => PersonaOutcome::Delivered {
                opinion,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            Ok(Ok(_)) => {
                warn!(persona = id, "persona returned an empty statement");
                PersonaOutcome::Unavailable {
                    reason: "empty statement".to_string(),
                }
            }
            Ok(Err(e)) => {
                warn!(persona = id, error = %e, "persona call failed");
                PersonaOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    persona = id,
                    timeout_secs = self.persona_timeout.as_secs(),
                    "persona timed out"
                );
                PersonaOutcome::Unavailable {
                    reason: format!("timed out after {}s", self.persona_timeout.as_secs()),
                }
            }
        }
    }
}
