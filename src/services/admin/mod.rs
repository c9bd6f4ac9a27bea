//! Administrative Sub-graph
//!
//! Planner, executor and reporter for office record operations. Only the
//! admin toolset is reachable from here.

pub mod executor;
pub mod plan;
pub mod planner;
pub mod reporter;
pub mod tools;

pub use executor::AdminExecutor;
pub use plan::{parse_reference, PlanOutcome, PlanStep, StepReference, ToolCallPlan};
pub use planner::{AdminPlanner, DELETE_CONFIRMATION};
pub use reporter::{AdminReport, AdminReporter, ReportSource};
pub use tools::{build_admin_toolset, RecordOperationTool};
