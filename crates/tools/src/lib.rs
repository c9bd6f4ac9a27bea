//! Counsel Desk Tools
//!
//! Tool-side types shared by the legal and administrative branches:
//! - `Toolset<P>` and the `LegalPartition`/`AdminPartition` capability partitions
//! - `AdminCatalogue` - generated typed record operations
//! - `ExecutionResult` - per-step outcome of an administrative plan
//! - `ParsedToolCall` - prompt-fallback tool call parsing
//!
//! Concrete tools (knowledge search, record operations) live in the main
//! crate next to the stores they wrap.

pub mod catalogue;
pub mod executor;
pub mod partition;
pub mod prompt_fallback;

// Re-export core types
pub use catalogue::{
    builtin_schemas, AdminCatalogue, EntityKind, EntitySchema, FieldSpec, FieldType,
    OperationDescriptor, OperationKind,
};
pub use executor::{ExecutionResult, FailureKind, StepStatus};
pub use partition::{
    AdminPartition, InvocationLog, LegalPartition, Partition, PartitionedTool, ToolInvocation,
    Toolset,
};
pub use prompt_fallback::{describe_tools, parse_tool_calls, ParsedToolCall};
