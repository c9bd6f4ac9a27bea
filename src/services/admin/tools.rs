//! Admin Partition Tools
//!
//! One `RecordOperationTool` per generated catalogue operation. Each wraps a
//! descriptor and the record store; the office always comes from the tool
//! context, never from arguments.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use counsel_core::{
    CoreError, CoreResult, ExecutionContext, ToolContext, ToolDefinitionTrait, ToolExecutable,
};
use counsel_tools::catalogue::{ID_PARAM, LIMIT_PARAM};
use counsel_tools::{AdminCatalogue, AdminPartition, OperationDescriptor, OperationKind, PartitionedTool, Toolset};

use crate::storage::records::RecordStore;
use crate::utils::error::AppError;

pub struct RecordOperationTool {
    descriptor: OperationDescriptor,
    store: Arc<dyn RecordStore>,
}

impl RecordOperationTool {
    pub fn new(descriptor: OperationDescriptor, store: Arc<dyn RecordStore>) -> Self {
        Self { descriptor, store }
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }
}

fn record_id(params: &Map<String, Value>) -> CoreResult<i64> {
    let raw = params
        .get(ID_PARAM)
        .ok_or_else(|| CoreError::validation("Missing required parameter: id"))?;
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CoreError::validation(format!("id must be an integer, got {}", raw)))
}

impl ToolDefinitionTrait for RecordOperationTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(&self.descriptor.input_schema).unwrap_or_default()
    }

    fn required_permissions(&self) -> Vec<String> {
        vec![self.descriptor.kind.permission().to_string()]
    }

    fn is_destructive(&self) -> bool {
        self.descriptor.kind.is_destructive()
    }
}

#[async_trait]
impl ToolExecutable for RecordOperationTool {
    async fn execute(&self, ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        let Value::Object(params) = args else {
            return Err(CoreError::validation("arguments must be a JSON object"));
        };

        let unknown = self.descriptor.unknown_params(&params);
        if !unknown.is_empty() {
            return Err(CoreError::validation(format!(
                "{} does not accept: {}",
                self.descriptor.name,
                unknown.join(", ")
            )));
        }
        let missing = self.descriptor.missing_params(&params);
        if !missing.is_empty() {
            return Err(CoreError::validation(format!(
                "{} is missing: {}",
                self.descriptor.name,
                missing.join(", ")
            )));
        }

        let store = self.store.clone();
        let office = ctx.tenant_id().to_string();
        let entity = self.descriptor.entity;
        let kind = self.descriptor.kind;

        let output = tokio::task::spawn_blocking(move || -> CoreResult<Value> {
            match kind {
                OperationKind::Query => {
                    let limit = params
                        .get(LIMIT_PARAM)
                        .and_then(Value::as_u64)
                        .map(|l| l as usize);
                    let mut filters = params;
                    filters.remove(LIMIT_PARAM);
                    let rows = store.query(&office, entity, &filters, limit)?;
                    Ok(Value::Array(rows))
                }
                OperationKind::Insert => Ok(store.insert(&office, entity, &params)?),
                OperationKind::Update => {
                    let id = record_id(&params)?;
                    let mut changes = params;
                    changes.remove(ID_PARAM);
                    Ok(store.update(&office, entity, id, &changes)?)
                }
                OperationKind::Delete => {
                    let id = record_id(&params)?;
                    Ok(store.delete(&office, entity, id)?)
                }
            }
        })
        .await
        .map_err(|e| CoreError::from(AppError::internal(format!("record task failed: {}", e))))??;

        tracing::info!(
            operation = %self.descriptor.name,
            office = %ctx.tenant_id(),
            write = kind.is_write(),
            "record operation committed"
        );
        Ok(output)
    }
}

impl PartitionedTool for RecordOperationTool {
    type Partition = AdminPartition;
}

/// The admin branch's complete toolset: one tool per catalogue operation.
pub fn build_admin_toolset(
    catalogue: &AdminCatalogue,
    store: Arc<dyn RecordStore>,
) -> CoreResult<Toolset<AdminPartition>> {
    let mut toolset = Toolset::new();
    for descriptor in catalogue.descriptors() {
        toolset.register(RecordOperationTool::new(descriptor.clone(), store.clone()))?;
    }
    Ok(toolset)
}
