//! LLM Types
//!
//! Core types for reasoning-call interactions: messages, tool definitions,
//! responses, and errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported provider types.
///
/// All of them speak the OpenAI-compatible chat completions protocol; the
/// type only selects a default endpoint and whether an API key is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    DeepSeek,
    Qwen,
    Ollama,
}

impl ProviderType {
    /// Default OpenAI-compatible base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "https://api.openai.com/v1",
            ProviderType::DeepSeek => "https://api.deepseek.com/v1",
            ProviderType::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ProviderType::Ollama => "http://localhost:11434/v1",
        }
    }

    /// Whether requests must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderType::Ollama)
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::DeepSeek => write!(f, "deepseek"),
            ProviderType::Qwen => write!(f, "qwen"),
            ProviderType::Ollama => write!(f, "ollama"),
        }
    }
}

/// Tool calling mode preference for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// Provider chooses when to call tools.
    #[default]
    Auto,
    /// Provider should require tool calls when tools are available.
    Required,
    /// Disable tool calling for this request.
    None,
}

/// Per-request options for provider behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmRequestOptions {
    /// Tool calling behavior for this request.
    #[serde(default)]
    pub tool_call_mode: ToolCallMode,
    /// Optional temperature override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_override: Option<f32>,
    /// Ask the provider for a JSON object reply when it supports it.
    #[serde(default)]
    pub json_response: bool,
    /// Pipeline stage issuing the call, for log correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl LlmRequestOptions {
    /// Options for a call that must answer with a JSON object.
    pub fn json(stage: impl Into<String>) -> Self {
        Self {
            tool_call_mode: ToolCallMode::None,
            temperature_override: Some(0.0),
            json_response: true,
            stage: Some(stage.into()),
        }
    }

    /// Options for a free-text call.
    pub fn prose(stage: impl Into<String>) -> Self {
        Self {
            tool_call_mode: ToolCallMode::None,
            stage: Some(stage.into()),
            ..Default::default()
        }
    }
}

/// Configuration for a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The provider type
    pub provider: ProviderType,
    /// API key (not needed for Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model name to use
    pub model: String,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.3
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::OpenAI,
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    /// Base URL to use, falling back to the provider default.
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Content type within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text content
    Text { text: String },
    /// Tool use request from the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Tool result from execution
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content (can be multiple blocks)
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a simple text message
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![MessageContent::Text { text: text.into() }],
        }
    }

    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(MessageRole::User, text)
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, text)
    }

    /// Concatenated text blocks of this message.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    fn scalar(schema_type: &str, description: Option<&str>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
            enum_values: None,
        }
    }

    /// Create a string schema
    pub fn string(description: Option<&str>) -> Self {
        Self::scalar("string", description)
    }

    /// Create an integer schema
    pub fn integer(description: Option<&str>) -> Self {
        Self::scalar("integer", description)
    }

    /// Create a number schema
    pub fn number(description: Option<&str>) -> Self {
        Self::scalar("number", description)
    }

    /// Create a boolean schema
    pub fn boolean(description: Option<&str>) -> Self {
        Self::scalar("boolean", description)
    }

    /// Create an object schema
    pub fn object(
        description: Option<&str>,
        properties: BTreeMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::scalar("object", description)
        }
    }
}

/// Definition of a tool that can be called by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's input parameters
    pub input_schema: ParameterSchema,
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// Arguments to pass to the tool
    pub arguments: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    /// Number of input/prompt tokens
    pub input_tokens: u32,
    /// Number of output/completion tokens
    pub output_tokens: u32,
}

impl UsageStats {
    /// Total tokens used
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Stop reason for the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    EndTurn,
    /// Hit max tokens limit
    MaxTokens,
    /// Model wants to use a tool
    ToolUse,
    /// Other/unknown reason
    Other(String),
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Response from a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Text content of the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Why the response ended
    pub stop_reason: StopReason,
    /// Token usage statistics
    pub usage: UsageStats,
    /// The model that generated the response
    pub model: String,
}

impl LlmResponse {
    /// A plain text response, mostly useful for test doubles.
    pub fn from_text(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            tool_calls: vec![],
            stop_reason: StopReason::EndTurn,
            usage: UsageStats::default(),
            model: model.into(),
        }
    }

    /// Check if the response has tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, empty when the model only called tools.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Error types for reasoning calls
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },
    /// Rate limit exceeded
    #[error("Rate limited: {message}")]
    RateLimited { message: String },
    /// Model not found or not available
    #[error("Model not found: {model}")]
    ModelNotFound { model: String },
    /// Invalid request (bad parameters)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
    /// Server error from the provider
    #[error("Server error ({status:?}): {message}")]
    ServerError { message: String, status: Option<u16> },
    /// Network/connection error, including timeouts
    #[error("Network error: {message}")]
    NetworkError { message: String },
    /// Response could not be parsed into the expected shape
    #[error("Parse error: {message}")]
    ParseError { message: String },
    /// Provider not available (e.g., local server not running)
    #[error("Provider unavailable: {message}")]
    ProviderUnavailable { message: String },
    /// Other error
    #[error("{message}")]
    Other { message: String },
}

/// Result type for reasoning calls
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_from_openai_strings() {
        assert_eq!(StopReason::from("stop"), StopReason::EndTurn);
        assert_eq!(StopReason::from("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from("tool_calls"), StopReason::ToolUse);
        assert_eq!(
            StopReason::from("content_filter"),
            StopReason::Other("content_filter".to_string())
        );
    }

    #[test]
    fn test_effective_base_url() {
        let mut config = ProviderConfig::default();
        assert_eq!(config.effective_base_url(), "https://api.openai.com/v1");
        config.base_url = Some("http://10.0.0.5:8000/v1".to_string());
        assert_eq!(config.effective_base_url(), "http://10.0.0.5:8000/v1");
    }

    #[test]
    fn test_message_text_content_skips_tool_blocks() {
        let msg = Message {
            role: MessageRole::Assistant,
            content: vec![
                MessageContent::Text {
                    text: "first".to_string(),
                },
                MessageContent::ToolUse {
                    id: "c1".to_string(),
                    name: "query_client".to_string(),
                    input: serde_json::json!({}),
                },
                MessageContent::Text {
                    text: "second".to_string(),
                },
            ],
        };
        assert_eq!(msg.text_content(), "first\nsecond");
    }

    #[test]
    fn test_parameter_schema_serializes_required() {
        let mut props = BTreeMap::new();
        props.insert("id".to_string(), ParameterSchema::integer(Some("Record id")));
        let schema = ParameterSchema::object(None, props, vec!["id".to_string()]);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["required"][0], "id");
        assert_eq!(json["properties"]["id"]["type"], "integer");
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::NetworkError {
            message: "timed out".to_string(),
        };
        assert_eq!(err.to_string(), "Network error: timed out");
    }
}
