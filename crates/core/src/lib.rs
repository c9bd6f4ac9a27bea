//! Counsel Desk Core
//!
//! Foundational traits, error types, and context hierarchy for the Counsel
//! Desk workspace. This crate has no dependencies on application-level code
//! (HTTP server, database, reasoning providers).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Execution context hierarchy (`ExecutionContext`, `ToolContext`, `OrchestratorContext`)
//! - `tool_trait` - Unified tool abstraction (`ToolDefinitionTrait`, `ToolExecutable`, `UnifiedTool`)

pub mod context;
pub mod error;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Context Hierarchy ──────────────────────────────────────────────────
pub use context::{ExecutionContext, OrchestratorContext, ToolContext};

// ── Unified Tool Trait ─────────────────────────────────────────────────
pub use tool_trait::{
    permissions, ToolDefinitionTrait, ToolExecutable, UnifiedTool, UnifiedToolRegistry,
};
