//! Panel Personas
//!
//! Built-in legal perspectives for the deliberation panel. Each persona has
//! an identity prompt and a reasoning focus; all of them read the same
//! facts.

use serde::{Deserialize, Serialize};

/// Panel member roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    /// Argues the client's strongest position
    Litigator,
    /// Weighs both sides the way a court would
    Judge,
    /// Reads the text doctrinally and flags interpretive gaps
    Scholar,
    /// Looks for settlement and practical next steps
    Mediator,
}

impl PersonaRole {
    /// Every role, in display order.
    pub fn all() -> [PersonaRole; 4] {
        [
            PersonaRole::Litigator,
            PersonaRole::Judge,
            PersonaRole::Scholar,
            PersonaRole::Mediator,
        ]
    }

    /// Short identifier used in config, logs and panel output.
    pub fn id(&self) -> &'static str {
        match self {
            PersonaRole::Litigator => "litigator",
            PersonaRole::Judge => "judge",
            PersonaRole::Scholar => "scholar",
            PersonaRole::Mediator => "mediator",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PersonaRole::Litigator => "Litigator",
            PersonaRole::Judge => "Judge",
            PersonaRole::Scholar => "Legal Scholar",
            PersonaRole::Mediator => "Mediator",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim().to_ascii_lowercase();
        Self::all().into_iter().find(|r| r.id() == id)
    }
}

impl std::fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A persona definition.
#[derive(Debug, Clone)]
pub struct Persona {
    pub role: PersonaRole,
    pub identity_prompt: &'static str,
    pub focus: &'static str,
    pub temperature: f32,
}

impl Persona {
    /// System prompt for this persona's single reasoning call.
    pub fn system_prompt(&self) -> String {
        format!(
            "{identity}\n\nFocus: {focus}\n\n\
             Rules:\n\
             - Use only the statute excerpts you are given. If they do not answer the question, say so.\n\
             - Cite articles exactly as they appear in the excerpt headers.\n\
             - Answer in the language of the question.\n\n\
             Reply with a JSON object only:\n\
             {{\"rationale\": \"your private step-by-step reasoning\", \
             \"statement\": \"two to four sentences for the lawyer\"}}",
            identity = self.identity_prompt,
            focus = self.focus,
        )
    }
}

/// Registry of built-in personas.
pub struct PersonaRegistry;

impl PersonaRegistry {
    pub fn get(role: PersonaRole) -> Persona {
        match role {
            PersonaRole::Litigator => Persona {
                role,
                identity_prompt: "You are a senior litigator advising a colleague. You read statutes for the \
                                  arguments they give the client and the procedural traps they set.",
                focus: "the strongest position the text supports and what must be proven",
                temperature: 0.4,
            },
            PersonaRole::Judge => Persona {
                role,
                identity_prompt: "You are an experienced first-instance judge. You read statutes for how a \
                                  court would apply them to both parties.",
                focus: "the likely ruling under the quoted articles and the conditions it depends on",
                temperature: 0.2,
            },
            PersonaRole::Scholar => Persona {
                role,
                identity_prompt: "You are a professor of civil law. You read statutes for their wording, \
                                  scope and the interpretive questions they leave open.",
                focus: "what the text says precisely and where it is silent or ambiguous",
                temperature: 0.3,
            },
            PersonaRole::Mediator => Persona {
                role,
                identity_prompt: "You are a commercial mediator. You read statutes for the room they leave \
                                  for agreement between the parties.",
                focus: "practical options and settlement levers the articles allow",
                temperature: 0.5,
            },
        }
    }

    /// Resolve configured persona ids. Unknown ids are returned separately.
    pub fn resolve(ids: &[String]) -> (Vec<Persona>, Vec<String>) {
        let mut personas: Vec<Persona> = Vec::new();
        let mut unknown = Vec::new();
        for id in ids {
            match PersonaRole::from_id(id) {
                Some(role) if !personas.iter().any(|p| p.role == role) => {
                    personas.push(Self::get(role))
                }
                Some(_) => {}
                None => unknown.push(id.clone()),
            }
        }
        (personas, unknown)
    }
}
