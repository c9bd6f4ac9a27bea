//! Legal Partition Tools
//!
//! The only way the legal branch reaches the knowledge base. Both tools are
//! read-only and declare `knowledge:read`; neither holds a record store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use counsel_core::permissions::KNOWLEDGE_READ;
use counsel_core::{CoreError, CoreResult, ToolContext, ToolDefinitionTrait, ToolExecutable};
use counsel_llm::types::ParameterSchema;
use counsel_tools::{LegalPartition, PartitionedTool, Toolset};

use super::hybrid_search::HybridRetriever;

pub const SEARCH_KNOWLEDGE: &str = "search_knowledge";
pub const EXPAND_CONTEXT: &str = "expand_context";

fn schema_value(schema: ParameterSchema) -> Value {
    serde_json::to_value(schema).unwrap_or_default()
}

fn required_str<'a>(args: &'a Value, key: &str) -> CoreResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::validation(format!("Missing required parameter: {}", key)))
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// search_knowledge
// ---------------------------------------------------------------------------

/// Ranked statute search over the knowledge base.
pub struct SearchKnowledgeTool {
    retriever: Arc<HybridRetriever>,
}

impl SearchKnowledgeTool {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }
}

impl ToolDefinitionTrait for SearchKnowledgeTool {
    fn name(&self) -> &str {
        SEARCH_KNOWLEDGE
    }

    fn description(&self) -> &str {
        "Search the legal knowledge base. Exact article matches in a passage header rank first, \
         then semantic similarity, then keyword overlap. Passages below min_score are dropped."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = BTreeMap::new();
        properties.insert(
            "query_text".to_string(),
            ParameterSchema::string(Some(
                "Literal query; article citations here are matched against passage headers",
            )),
        );
        properties.insert(
            "semantic_query".to_string(),
            ParameterSchema::string(Some(
                "Paraphrase used for semantic matching (defaults to query_text)",
            )),
        );
        properties.insert(
            "country".to_string(),
            ParameterSchema::string(Some("Jurisdiction folder to restrict the search to")),
        );
        properties.insert(
            "min_score".to_string(),
            ParameterSchema::number(Some("Quality gate between 0 and 1")),
        );
        schema_value(ParameterSchema::object(
            Some("search_knowledge parameters"),
            properties,
            vec!["query_text".to_string()],
        ))
    }

    fn required_permissions(&self) -> Vec<String> {
        vec![KNOWLEDGE_READ.to_string()]
    }
}

#[async_trait]
impl ToolExecutable for SearchKnowledgeTool {
    async fn execute(&self, _ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        let query_text = required_str(&args, "query_text")?;
        let semantic_query = optional_str(&args, "semantic_query").unwrap_or(query_text);
        let country = optional_str(&args, "country");
        let min_score = args
            .get("min_score")
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 1.0) as f32);

        let outcome = self
            .retriever
            .search(query_text, semantic_query, country, min_score)
            .await?;
        Ok(serde_json::to_value(outcome)?)
    }
}

impl PartitionedTool for SearchKnowledgeTool {
    type Partition = LegalPartition;
}

// ---------------------------------------------------------------------------
// expand_context
// ---------------------------------------------------------------------------

/// Adjacent chunks around a passage.
pub struct ExpandContextTool {
    retriever: Arc<HybridRetriever>,
}

impl ExpandContextTool {
    pub fn new(retriever: Arc<HybridRetriever>) -> Self {
        Self { retriever }
    }
}

impl ToolDefinitionTrait for ExpandContextTool {
    fn name(&self) -> &str {
        EXPAND_CONTEXT
    }

    fn description(&self) -> &str {
        "Fetch the chunks immediately before and after a passage of the same source."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = BTreeMap::new();
        properties.insert(
            "source_id".to_string(),
            ParameterSchema::string(Some("Source id of the passage")),
        );
        properties.insert(
            "chunk_index".to_string(),
            ParameterSchema::integer(Some("Chunk index of the passage")),
        );
        properties.insert(
            "radius".to_string(),
            ParameterSchema::integer(Some("Chunks to include on each side")),
        );
        schema_value(ParameterSchema::object(
            Some("expand_context parameters"),
            properties,
            vec!["source_id".to_string(), "chunk_index".to_string()],
        ))
    }

    fn required_permissions(&self) -> Vec<String> {
        vec![KNOWLEDGE_READ.to_string()]
    }
}

#[async_trait]
impl ToolExecutable for ExpandContextTool {
    async fn execute(&self, _ctx: &ToolContext, args: Value) -> CoreResult<Value> {
        let source_id = required_str(&args, "source_id")?;
        let chunk_index = args
            .get("chunk_index")
            .and_then(Value::as_u64)
            .ok_or_else(|| CoreError::validation("Missing required parameter: chunk_index"))?
            as usize;
        let radius = args
            .get("radius")
            .and_then(Value::as_u64)
            .map(|r| r.min(5) as usize);

        let window = self
            .retriever
            .expand_context(source_id, chunk_index, radius)
            .await?;
        Ok(serde_json::to_value(window)?)
    }
}

impl PartitionedTool for ExpandContextTool {
    type Partition = LegalPartition;
}

/// The legal branch's complete toolset.
pub fn build_legal_toolset(retriever: Arc<HybridRetriever>) -> CoreResult<Toolset<LegalPartition>> {
    let mut toolset = Toolset::new();
    toolset.register(SearchKnowledgeTool::new(retriever.clone()))?;
    toolset.register(ExpandContextTool::new(retriever))?;
    Ok(toolset)
}
