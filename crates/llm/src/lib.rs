//! Counsel Desk LLM
//!
//! The reasoning-call capability used by every pipeline stage:
//! - `LlmProvider` trait and shared message/tool types
//! - `OpenAIProvider` for OpenAI-compatible endpoints (OpenAI, DeepSeek,
//!   Qwen compatible mode, Ollama)
//! - `structured` helpers for JSON replies with one repair retry
//! - the HTTP client factory

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod structured;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use structured::{extract_json_from_response, parse_json_reply, request_json};
pub use types::*;
