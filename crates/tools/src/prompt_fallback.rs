//! Prompt-Based Tool Calling Fallback
//!
//! Tool descriptions rendered into a system prompt, and tool call blocks
//! parsed back out of plain text. Used by the admin planner for models that
//! answer with tool call blocks instead of native tool calls or the JSON
//! plan it asked for.

use serde::{Deserialize, Serialize};

use counsel_llm::types::ToolDefinition;

/// A tool call parsed from a text response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedToolCall {
    /// The name of the tool to call
    pub tool_name: String,
    /// The arguments as a JSON value
    pub arguments: serde_json::Value,
    /// The raw text block that was parsed
    pub raw_text: String,
}

/// Render tool names, descriptions, and parameters as prompt text.
pub fn describe_tools(tools: &[ToolDefinition]) -> String {
    let mut tool_descriptions = String::new();

    for tool in tools {
        tool_descriptions.push_str(&format!("### {}\n", tool.name));
        tool_descriptions.push_str(&format!("{}\n", tool.description));

        if let Some(properties) = tool.input_schema.properties.as_ref() {
            if !properties.is_empty() {
                tool_descriptions.push_str("Parameters:\n");
                let required = tool.input_schema.required.clone().unwrap_or_default();
                for (name, schema) in properties {
                    let req_marker = if required.contains(name) {
                        " (required)"
                    } else {
                        " (optional)"
                    };
                    let desc = schema.description.as_deref().unwrap_or("");
                    tool_descriptions.push_str(&format!(
                        "  - `{}` ({}{}): {}\n",
                        name, schema.schema_type, req_marker, desc
                    ));
                }
            }
        }
        tool_descriptions.push('\n');
    }

    tool_descriptions
}

/// Parse tool call blocks from a text response.
///
/// Handles, in order:
/// - Pass 1: `` ```tool_call ... ``` `` markdown blocks
/// - Pass 2: `<tool_call>...</tool_call>` XML blocks
/// - Pass 3: bare JSON lines `{"tool": "Name", "arguments": {...}}`
pub fn parse_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();

    // Pass 1: ```tool_call ... ``` markdown blocks
    let mut remaining = text;
    while let Some(start) = remaining.find("```tool_call") {
        let after_marker = &remaining[start + 12..];
        if let Some(end) = after_marker.find("```") {
            let block_content = after_marker[..end].trim();
            if let Some((tool_name, arguments)) = parse_single_tool_call(block_content) {
                calls.push(ParsedToolCall {
                    tool_name,
                    arguments,
                    raw_text: format!("```tool_call\n{}\n```", block_content),
                });
            }
            remaining = &after_marker[end + 3..];
        } else {
            break;
        }
    }

    // Pass 2: <tool_call>...</tool_call> XML blocks
    let mut remaining = text;
    while let Some(start) = remaining.find("<tool_call>") {
        let after_tag = &remaining[start + 11..];
        let Some(end) = after_tag.find("</tool_call>") else {
            break;
        };
        let block_content = after_tag[..end].trim();
        if let Some((tool_name, arguments)) = parse_single_tool_call(block_content) {
            calls.push(ParsedToolCall {
                tool_name,
                arguments,
                raw_text: format!("<tool_call>{}</tool_call>", block_content),
            });
        }
        remaining = &after_tag[end + 12..];
    }

    // Pass 3: bare JSON, only when nothing was wrapped
    if calls.is_empty() && !has_unclosed_tool_call_fence(text) {
        calls.extend(parse_bare_json_tool_calls(text));
    }

    calls
}

/// Parse bare JSON tool calls spanning one or more lines.
fn parse_bare_json_tool_calls(text: &str) -> Vec<ParsedToolCall> {
    let mut calls = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let first = lines[i].trim();
        if !(first.starts_with('{') && first.contains("\"tool\"")) {
            i += 1;
            continue;
        }

        let mut json_str = first.to_string();
        let mut brace_count =
            first.matches('{').count() as i32 - first.matches('}').count() as i32;
        let mut j = i + 1;
        while brace_count > 0 && j < lines.len() {
            let next = lines[j].trim();
            json_str.push('\n');
            json_str.push_str(next);
            brace_count += next.matches('{').count() as i32 - next.matches('}').count() as i32;
            j += 1;
        }

        if let Some((tool_name, arguments)) = parse_single_tool_call(&json_str) {
            calls.push(ParsedToolCall {
                tool_name,
                arguments,
                raw_text: json_str,
            });
        }
        i = j;
    }

    calls
}

fn has_unclosed_tool_call_fence(text: &str) -> bool {
    let mut remaining = text;
    while let Some(start) = remaining.find("```tool_call") {
        let after_marker = &remaining[start + 12..];
        if let Some(end) = after_marker.find("```") {
            remaining = &after_marker[end + 3..];
        } else {
            return true;
        }
    }
    false
}

/// Parse a single tool call JSON block.
fn parse_single_tool_call(content: &str) -> Option<(String, serde_json::Value)> {
    let json: serde_json::Value = serde_json::from_str(content).ok()?;
    let tool_name = json.get("tool")?.as_str()?.to_string();
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
    Some((tool_name, arguments))
}
