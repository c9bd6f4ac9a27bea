//! Capability Partitions
//!
//! The legal and administrative branches each hold a `Toolset<P>` for their
//! own partition `P`. A tool declares its partition as an associated type,
//! so registering an administrative tool into the legal toolset does not
//! type-check:
//!
//! ```compile_fail
//! use async_trait::async_trait;
//! use counsel_core::{CoreResult, ToolContext, ToolDefinitionTrait, ToolExecutable};
//! use counsel_tools::{AdminPartition, LegalPartition, PartitionedTool, Toolset};
//!
//! struct DeleteClient;
//! impl ToolDefinitionTrait for DeleteClient {
//!     fn name(&self) -> &str { "delete_client" }
//!     fn description(&self) -> &str { "" }
//!     fn parameters_schema(&self) -> serde_json::Value { serde_json::json!({}) }
//! }
//! #[async_trait]
//! impl ToolExecutable for DeleteClient {
//!     async fn execute(&self, _: &ToolContext, _: serde_json::Value) -> CoreResult<serde_json::Value> {
//!         Ok(serde_json::Value::Null)
//!     }
//! }
//! impl PartitionedTool for DeleteClient { type Partition = AdminPartition; }
//!
//! let mut legal: Toolset<LegalPartition> = Toolset::new();
//! legal.register(DeleteClient).unwrap();
//! ```
//!
//! Declared permissions are additionally checked against the partition's
//! grant when the tool is registered, so a mislabelled tool fails at
//! startup rather than at call time.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use counsel_core::permissions::{KNOWLEDGE_READ, RECORDS_READ, RECORDS_WRITE};
use counsel_core::{
    CoreError, CoreResult, ExecutionContext, ToolContext, UnifiedTool, UnifiedToolRegistry,
};
use counsel_llm::types::{ParameterSchema, ToolDefinition};

// ============================================================================
// Partitions
// ============================================================================

/// A capability partition: a name plus the permissions its tools may hold.
pub trait Partition: Send + Sync + 'static {
    /// Partition name used in logs and invocation records.
    const NAME: &'static str;
    /// Permissions a tool in this partition may declare.
    const GRANTS: &'static [&'static str];
}

/// Legal research branch: read-only knowledge base access.
#[derive(Debug)]
pub enum LegalPartition {}

impl Partition for LegalPartition {
    const NAME: &'static str = "legal";
    const GRANTS: &'static [&'static str] = &[KNOWLEDGE_READ];
}

/// Administrative branch: office records, read and write.
#[derive(Debug)]
pub enum AdminPartition {}

impl Partition for AdminPartition {
    const NAME: &'static str = "admin";
    const GRANTS: &'static [&'static str] = &[RECORDS_READ, RECORDS_WRITE];
}

/// A tool bound to exactly one partition.
pub trait PartitionedTool: UnifiedTool {
    type Partition: Partition;
}

// ============================================================================
// Invocation log
// ============================================================================

/// One tool call made during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub partition: String,
    pub tool: String,
    pub tool_call_id: String,
    pub success: bool,
    pub elapsed_ms: u64,
}

/// Append-only record of the tool calls made in one turn.
#[derive(Debug, Default)]
pub struct InvocationLog {
    entries: Mutex<Vec<ToolInvocation>>,
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: ToolInvocation) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
    }

    /// Copy of the entries recorded so far.
    pub fn snapshot(&self) -> Vec<ToolInvocation> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

// ============================================================================
// Toolset
// ============================================================================

/// The only tool handle a branch holds.
pub struct Toolset<P: Partition> {
    registry: UnifiedToolRegistry,
    _partition: PhantomData<fn() -> P>,
}

impl<P: Partition> Toolset<P> {
    /// Create an empty toolset.
    pub fn new() -> Self {
        Self {
            registry: UnifiedToolRegistry::new(),
            _partition: PhantomData,
        }
    }

    /// Register a tool of this partition.
    ///
    /// Fails with `CoreError::Denied` when the tool declares a permission
    /// outside the partition's grant.
    pub fn register<T>(&mut self, tool: T) -> CoreResult<()>
    where
        T: PartitionedTool<Partition = P> + 'static,
    {
        if let Some(extra) = tool
            .required_permissions()
            .into_iter()
            .find(|perm| !P::GRANTS.contains(&perm.as_str()))
        {
            return Err(CoreError::denied(format!(
                "tool {} requires {} which the {} partition does not grant",
                tool.name(),
                extra,
                P::NAME
            )));
        }
        self.registry.register(Arc::new(tool));
        Ok(())
    }

    /// Name of the partition this toolset belongs to.
    pub fn partition(&self) -> &'static str {
        P::NAME
    }

    pub fn names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Tool definitions for a reasoning call, in registration order.
    pub fn tool_definitions(&self) -> CoreResult<Vec<ToolDefinition>> {
        self.registry
            .iter()
            .map(|tool| {
                let input_schema: ParameterSchema =
                    serde_json::from_value(tool.parameters_schema())?;
                Ok(ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    input_schema,
                })
            })
            .collect()
    }

    /// Invoke a tool of this partition and record the call in `log`.
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &ToolContext,
        args: Value,
        log: &InvocationLog,
    ) -> CoreResult<Value> {
        let started = Instant::now();
        let result = self.registry.execute(name, ctx, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::debug!(
            partition = P::NAME,
            tool = name,
            tenant = ctx.tenant_id(),
            tool_call_id = ctx.tool_call_id(),
            success = result.is_ok(),
            elapsed_ms,
            "tool invoked"
        );

        log.push(ToolInvocation {
            partition: P::NAME.to_string(),
            tool: name.to_string(),
            tool_call_id: ctx.tool_call_id().to_string(),
            success: result.is_ok(),
            elapsed_ms,
        });
        result
    }
}

impl<P: Partition> Default for Toolset<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use counsel_core::{ToolDefinitionTrait, ToolExecutable};

    use super::*;

    struct Lookup {
        permissions: Vec<String>,
    }

    impl ToolDefinitionTrait for Lookup {
        fn name(&self) -> &str {
            "search_knowledge"
        }

        fn description(&self) -> &str {
            "Search statutes"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": { "query_text": { "type": "string" } },
                "required": ["query_text"]
            })
        }

        fn required_permissions(&self) -> Vec<String> {
            self.permissions.clone()
        }
    }

    #[async_trait]
    impl ToolExecutable for Lookup {
        async fn execute(&self, _ctx: &ToolContext, args: Value) -> CoreResult<Value> {
            if args.get("query_text").is_none() {
                return Err(CoreError::validation("query_text is required"));
            }
            Ok(serde_json::json!([]))
        }
    }

    impl PartitionedTool for Lookup {
        type Partition = LegalPartition;
    }

    fn ctx() -> ToolContext {
        ToolContext::new("s", "office-1", "lawyer-1", "tc-1")
    }

    #[test]
    fn test_register_within_grant() {
        let mut toolset: Toolset<LegalPartition> = Toolset::new();
        toolset
            .register(Lookup {
                permissions: vec![KNOWLEDGE_READ.to_string()],
            })
            .unwrap();
        assert_eq!(toolset.partition(), "legal");
        assert_eq!(toolset.names(), vec!["search_knowledge"]);
    }

    #[test]
    fn test_register_outside_grant_is_denied() {
        let mut toolset: Toolset<LegalPartition> = Toolset::new();
        let err = toolset
            .register(Lookup {
                permissions: vec![RECORDS_WRITE.to_string()],
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Denied(_)));
        assert!(toolset.is_empty());
    }

    #[test]
    fn test_tool_definitions_convert_schema() {
        let mut toolset: Toolset<LegalPartition> = Toolset::new();
        toolset.register(Lookup { permissions: vec![] }).unwrap();
        let defs = toolset.tool_definitions().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(
            defs[0].input_schema.required,
            Some(vec!["query_text".to_string()])
        );
    }

    #[tokio::test]
    async fn test_invoke_records_success_and_failure() {
        let mut toolset: Toolset<LegalPartition> = Toolset::new();
        toolset.register(Lookup { permissions: vec![] }).unwrap();
        let log = InvocationLog::new();

        toolset
            .invoke(
                "search_knowledge",
                &ctx(),
                serde_json::json!({"query_text": "المادة 368"}),
                &log,
            )
            .await
            .unwrap();
        assert!(toolset
            .invoke("search_knowledge", &ctx(), serde_json::json!({}), &log)
            .await
            .is_err());
        assert!(toolset
            .invoke("update_case", &ctx(), serde_json::json!({}), &log)
            .await
            .is_err());

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.partition == "legal"));
        assert!(entries[0].success);
        assert!(!entries[1].success);
        assert!(!entries[2].success);
    }
}
