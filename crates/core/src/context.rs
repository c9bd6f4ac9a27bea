//! Context Hierarchy
//!
//! Two concrete contexts share one read-only base:
//!
//! 1. `ExecutionContext` trait - session, tenant (office), and acting lawyer
//! 2. `ToolContext` - what a single tool call sees
//! 3. `OrchestratorContext` - what one conversation turn's pipeline holds
//!
//! Tools only ever receive a `ToolContext`. The tenant identifier travels
//! inside it, so a tool never takes the office as an argument and cannot be
//! talked into reading another office's records.

use crate::error::{CoreError, CoreResult};

// ============================================================================
// ExecutionContext Trait
// ============================================================================

/// Base execution context providing immutable per-turn identity.
pub trait ExecutionContext: Send + Sync {
    /// Chat session identifier supplied by the caller.
    fn session_id(&self) -> &str;

    /// Office (tenant) every record operation is scoped to.
    fn tenant_id(&self) -> &str;

    /// Lawyer on whose behalf the turn runs.
    fn actor_id(&self) -> &str;

    /// Optional tag for log correlation (e.g. "legal", "admin").
    fn execution_tag(&self) -> Option<&str> {
        None
    }
}

// ============================================================================
// ToolContext
// ============================================================================

/// Context for a single tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session_id: String,
    tenant_id: String,
    actor_id: String,
    execution_tag: Option<String>,
    /// Unique identifier for this specific tool call.
    tool_call_id: String,
}

impl ToolContext {
    /// Create a new ToolContext.
    pub fn new(
        session_id: impl Into<String>,
        tenant_id: impl Into<String>,
        actor_id: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
            execution_tag: None,
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Set the execution tag.
    pub fn with_execution_tag(mut self, tag: impl Into<String>) -> Self {
        self.execution_tag = Some(tag.into());
        self
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }
}

impl ExecutionContext for ToolContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn actor_id(&self) -> &str {
        &self.actor_id
    }

    fn execution_tag(&self) -> Option<&str> {
        self.execution_tag.as_deref()
    }
}

// ============================================================================
// OrchestratorContext
// ============================================================================

/// Context owned by one conversation turn.
///
/// Request-scoped: built when a chat message arrives and dropped with the
/// turn. Holds no shared mutable state, so concurrent turns never observe
/// each other.
#[derive(Debug, Clone)]
pub struct OrchestratorContext {
    turn_id: String,
    session_id: String,
    tenant_id: String,
    actor_id: String,
    execution_tag: Option<String>,
}

impl OrchestratorContext {
    /// Create a new OrchestratorContext.
    ///
    /// An empty tenant is rejected: every record operation downstream
    /// depends on it.
    pub fn new(
        turn_id: impl Into<String>,
        session_id: impl Into<String>,
        tenant_id: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> CoreResult<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.trim().is_empty() {
            return Err(CoreError::validation("tenant id must not be empty"));
        }
        Ok(Self {
            turn_id: turn_id.into(),
            session_id: session_id.into(),
            tenant_id,
            actor_id: actor_id.into(),
            execution_tag: None,
        })
    }

    /// Set the execution tag.
    pub fn with_execution_tag(mut self, tag: impl Into<String>) -> Self {
        self.execution_tag = Some(tag.into());
        self
    }

    /// Identifier of the turn this context belongs to.
    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    /// Create a `ToolContext` for a specific tool call within this turn.
    pub fn create_tool_context(&self, tool_call_id: impl Into<String>) -> ToolContext {
        ToolContext {
            session_id: self.session_id.clone(),
            tenant_id: self.tenant_id.clone(),
            actor_id: self.actor_id.clone(),
            execution_tag: self.execution_tag.clone(),
            tool_call_id: tool_call_id.into(),
        }
    }
}

impl ExecutionContext for OrchestratorContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn actor_id(&self) -> &str {
        &self.actor_id
    }

    fn execution_tag(&self) -> Option<&str> {
        self.execution_tag.as_deref()
    }
}

// ============================================================================
// Tests
// ============================================================================
