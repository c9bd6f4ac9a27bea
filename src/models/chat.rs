//! Chat Models
//!
//! Request and response bodies of the chat endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use counsel_llm::{Message, MessageRole};
use counsel_tools::ExecutionResult;

/// Which branches a turn may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Auto,
    /// Legal research only; record operations are not offered
    Research,
    /// Record operations only; knowledge search is not offered
    Admin,
}

/// One prior message supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    /// Convert to a reasoning-call message. Unknown roles are dropped.
    pub fn to_message(&self) -> Option<Message> {
        let role = match self.role.trim().to_ascii_lowercase().as_str() {
            "user" => MessageRole::User,
            "assistant" | "bot" | "ai" => MessageRole::Assistant,
            _ => return None,
        };
        if self.content.trim().is_empty() {
            return None;
        }
        Some(Message::text(role, self.content.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    /// Office the lawyer works for; record operations are scoped to it
    #[serde(default)]
    pub office_id: Option<String>,
    /// Jurisdiction folder to restrict knowledge search to
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub mode: ChatMode,
    pub lawyer_id: String,
    #[serde(default)]
    pub context: ChatContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, lawyer_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            mode: ChatMode::Auto,
            lawyer_id: lawyer_id.into(),
            context: ChatContext::default(),
        }
    }

    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_office(mut self, office_id: impl Into<String>) -> Self {
        self.context.office_id = Some(office_id.into());
        self
    }

    /// Tenant that record operations are scoped to: the office when given,
    /// otherwise the lawyer.
    pub fn tenant_id(&self) -> &str {
        self.context
            .office_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.lawyer_id.trim())
    }

    /// The last `limit` usable history messages, oldest first.
    pub fn history_messages(&self, limit: usize) -> Vec<Message> {
        let messages: Vec<Message> = self
            .context
            .history
            .iter()
            .filter_map(HistoryMessage::to_message)
            .collect();
        let skip = messages.len().saturating_sub(limit);
        messages.into_iter().skip(skip).collect()
    }
}

/// Which part of the pipeline produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Gatekeeper,
    LegalResearch,
    Admin,
    Direct,
}

/// UI metadata. Each field is set only by the branch that produced it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognitive_decision: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Vec<ExecutionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_plan: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub metadata: ChatMetadata,
}
