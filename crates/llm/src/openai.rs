//! OpenAI-compatible Provider
//!
//! Implementation of the LlmProvider trait for any endpoint speaking the
//! OpenAI chat completions protocol (OpenAI, DeepSeek, Qwen compatible mode,
//! Ollama `/v1`). Non-streaming: the router needs whole replies.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};
use crate::http_client::build_http_client;

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    /// Create a new provider with the given configuration
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self { config, client })
    }

    /// Resolve an endpoint path against the configured base URL.
    fn endpoint(&self, path: &str) -> LlmResult<Url> {
        let mut base = self.config.effective_base_url().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|url| url.join(path))
            .map_err(|e| LlmError::InvalidRequest {
                message: format!("invalid base URL {:?}: {}", base, e),
            })
    }

    fn api_key(&self) -> LlmResult<Option<&str>> {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(Some(key)),
            _ if self.config.provider.requires_api_key() => {
                Err(missing_api_key_error(&self.config.provider.to_string()))
            }
            _ => Ok(None),
        }
    }

    /// Build the request body for the API
    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "stream": false,
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
        });

        let mut openai_messages: Vec<serde_json::Value> = Vec::new();

        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            openai_messages.extend(self.message_to_openai(msg));
        }

        body["messages"] = serde_json::json!(openai_messages);

        if !tools.is_empty() && request_options.tool_call_mode != ToolCallMode::None {
            let openai_tools: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_openai(t)).collect();
            body["tools"] = serde_json::json!(openai_tools);
            if matches!(request_options.tool_call_mode, ToolCallMode::Required) {
                body["tool_choice"] = serde_json::json!("required");
            }
        }

        if request_options.json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    /// Convert a Message to one or more OpenAI API messages.
    ///
    /// Tool results become separate `tool` role messages.
    fn message_to_openai(&self, message: &Message) -> Vec<serde_json::Value> {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        let results: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                })),
                _ => None,
            })
            .collect();
        if !results.is_empty() {
            return results;
        }

        let tool_calls: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolUse { id, name, input } => Some(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string()
                    }
                })),
                _ => None,
            })
            .collect();

        let text_content = message.text_content();

        if !tool_calls.is_empty() {
            // Some compatible APIs reject a missing content field.
            let content = if text_content.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::json!(text_content)
            };
            return vec![serde_json::json!({
                "role": role,
                "content": content,
                "tool_calls": tool_calls
            })];
        }

        vec![serde_json::json!({
            "role": role,
            "content": text_content
        })]
    }

    /// Convert a ToolDefinition to OpenAI API format
    fn tool_to_openai(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema
            }
        })
    }

    /// Parse a response from the API
    fn parse_response(&self, response: &OpenAIResponse) -> LlmResponse {
        let choice = response.choices.first();

        let mut content = None;
        let mut tool_calls = Vec::new();

        if let Some(msg) = choice.and_then(|c| c.message.as_ref()) {
            content = msg.content.clone();
            for tc in msg.tool_calls.iter().flatten() {
                let arguments: serde_json::Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(serde_json::Value::Null);
                tool_calls.push(ToolCall {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments,
                });
            }
        }

        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
            model: response
                .model
                .clone()
                .unwrap_or_else(|| self.config.model.clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let url = self.endpoint("chat/completions")?;
        let body = self.build_request_body(&messages, system.as_deref(), &tools, &request_options);

        tracing::debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            stage = request_options.stage.as_deref().unwrap_or("-"),
            messages = messages.len(),
            tools = tools.len(),
            "sending reasoning call"
        );

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = self.api_key()? {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;

        if status != 200 {
            return Err(parse_http_error(
                status,
                &body_text,
                &self.config.provider.to_string(),
            ));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&openai_response))
    }

    async fn health_check(&self) -> LlmResult<()> {
        let url = self.endpoint("models")?;
        let mut request = self.client.get(url);
        if let Some(key) = self.api_key()? {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| LlmError::ProviderUnavailable {
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(
                status,
                &body,
                &self.config.provider.to_string(),
            ))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
