//! Structured Replies
//!
//! Helpers for stages that need a JSON object back from a reasoning call.
//! A reply that does not parse gets exactly one repair retry: the bad reply
//! and the parse error are fed back and the model is asked for the bare
//! object. A second failure is a `ParseError`.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::provider::LlmProvider;
use crate::types::{LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message};

/// Ask for a JSON reply and deserialize it into `T`.
pub async fn request_json<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    system: &str,
    messages: Vec<Message>,
    options: LlmRequestOptions,
) -> LlmResult<T> {
    let response = provider
        .send_message(
            messages.clone(),
            Some(system.to_string()),
            vec![],
            options.clone(),
        )
        .await?;
    let response_text = extract_response_text(&response)?;

    let first_error = match parse_json_reply::<T>(&response_text) {
        Ok(parsed) => return Ok(parsed),
        Err(e) => e,
    };

    debug!(
        stage = options.stage.as_deref().unwrap_or("-"),
        error = %first_error,
        "structured reply did not parse, retrying with repair prompt"
    );

    let mut retry_messages = messages;
    retry_messages.push(Message::assistant(&response_text));
    retry_messages.push(Message::user(build_repair_prompt(
        &response_text,
        &first_error,
    )));

    let retry_response = provider
        .send_message(retry_messages, Some(system.to_string()), vec![], options)
        .await?;
    let retry_text = extract_response_text(&retry_response)?;

    parse_json_reply::<T>(&retry_text).map_err(|second_error| LlmError::ParseError {
        message: format!(
            "reply was not valid JSON after retry. First error: {}. Retry error: {}",
            first_error, second_error
        ),
    })
}

/// Parse a reply text into `T`, tolerating fences and surrounding prose.
pub fn parse_json_reply<T: DeserializeOwned>(response_text: &str) -> Result<T, String> {
    if response_text.trim().is_empty() {
        return Err("empty reply".to_string());
    }

    let json_str = extract_json_from_response(response_text);
    serde_json::from_str(&json_str).map_err(|e| {
        format!(
            "Invalid JSON: {}. Content: {:?}",
            e,
            json_str.chars().take(200).collect::<String>()
        )
    })
}

/// Extract a JSON object from response text, handling markdown fences and
/// surrounding text.
pub fn extract_json_from_response(response_text: &str) -> String {
    let trimmed = response_text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let content_start = after_fence.find('\n').map(|nl| nl + 1).unwrap_or(0);
        let content = &after_fence[content_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start <= end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

fn extract_response_text(response: &LlmResponse) -> LlmResult<String> {
    match response.content.as_deref() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(LlmError::ParseError {
            message: format!(
                "reply contained no text (model: {}, stop_reason: {:?})",
                response.model, response.stop_reason
            ),
        }),
    }
}

fn build_repair_prompt(original_response: &str, parse_error: &str) -> String {
    format!(
        "Your previous response could not be parsed as valid JSON.\n\n\
         Parse error: {}\n\n\
         Your previous response was:\n{}\n\n\
         Respond with ONLY a valid JSON object matching the schema. \
         No markdown fences, no explanatory text. Just the raw JSON object \
         starting with {{ and ending with }}.",
        parse_error, original_response
    )
}
