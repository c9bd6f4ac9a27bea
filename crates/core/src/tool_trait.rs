//! Unified Tool Trait
//!
//! Core-layer tool abstraction with split definition/execution traits:
//!
//! - `ToolDefinitionTrait` - Identity, schema, permissions, metadata
//! - `ToolExecutable` - Execution capability
//! - `UnifiedTool` - Combined trait (auto-implemented via blanket impl)
//! - `UnifiedToolRegistry` - O(1) lookup registry with ordered iteration
//!
//! Schema-only consumers (the admin planner's prompt, reasoning-call tool
//! lists) read definitions without touching execution.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::{CoreError, CoreResult};

/// Capability strings a tool may require.
pub mod permissions {
    /// Read passages from the legal knowledge base.
    pub const KNOWLEDGE_READ: &str = "knowledge:read";
    /// Read office records (clients, cases, hearings, tasks).
    pub const RECORDS_READ: &str = "records:read";
    /// Create, change, or remove office records.
    pub const RECORDS_WRITE: &str = "records:write";
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// Tool definition metadata trait.
///
/// Provides identity and schema information about a tool without
/// requiring execution capability.
pub trait ToolDefinitionTrait: Send + Sync {
    /// Unique name of this tool (e.g., "search_knowledge", "update_case").
    fn name(&self) -> &str;

    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema describing input parameters.
    ///
    /// ```json
    /// {
    ///   "type": "object",
    ///   "properties": {
    ///     "id": { "type": "integer", "description": "Client id" }
    ///   },
    ///   "required": ["id"]
    /// }
    /// ```
    fn parameters_schema(&self) -> Value;

    /// Permissions required by this tool, drawn from [`permissions`].
    fn required_permissions(&self) -> Vec<String> {
        vec![]
    }

    /// Whether a call irreversibly removes data.
    fn is_destructive(&self) -> bool {
        false
    }
}

/// Tool execution trait.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Execute the tool with the given context and arguments.
    ///
    /// # Arguments
    /// - `ctx` - The tool execution context (session, tenant, actor)
    /// - `args` - JSON arguments matching the tool's `parameters_schema()`
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<Value>;
}

/// Combined trait for tools that provide both definition and execution.
pub trait UnifiedTool: ToolDefinitionTrait + ToolExecutable {}

// Blanket implementation: anything that implements both traits is a UnifiedTool
impl<T: ToolDefinitionTrait + ToolExecutable> UnifiedTool for T {}

// ============================================================================
// UnifiedToolRegistry
// ============================================================================

/// Registry for `UnifiedTool` implementations.
///
/// Provides O(1) lookup by name and iteration in registration order.
pub struct UnifiedToolRegistry {
    tools: HashMap<String, Arc<dyn UnifiedTool>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl UnifiedToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn UnifiedTool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn UnifiedTool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn UnifiedTool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Get tool definitions as JSON values in registration order.
    pub fn definitions(&self) -> Vec<Value> {
        self.iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                    "required_permissions": tool.required_permissions(),
                    "is_destructive": tool.is_destructive(),
                })
            })
            .collect()
    }

    /// Get all tools that require a specific permission.
    pub fn tools_with_permission(&self, permission: &str) -> Vec<String> {
        self.iter()
            .filter(|t| t.required_permissions().iter().any(|p| p == permission))
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// Returns `Err(CoreError::NotFound)` if the tool is not registered.
    pub async fn execute(&self, name: &str, ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(ctx, args).await,
            None => Err(CoreError::not_found(format!("Tool not found: {}", name))),
        }
    }
}

impl Default for UnifiedToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
