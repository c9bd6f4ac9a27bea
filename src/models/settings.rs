//! Settings Models
//!
//! Application configuration stored in config.json, plus the environment
//! overrides applied on top of it at startup.

use std::path::PathBuf;

use counsel_llm::ProviderConfig;
use serde::{Deserialize, Serialize};

/// Application configuration stored in config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    /// Reasoning-call provider used by every pipeline stage
    #[serde(default)]
    pub llm: ProviderConfig,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub panel: PanelSettings,
    #[serde(default)]
    pub router: RouterSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Socket address the HTTP server listens on
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

/// Which embedding backend the retriever uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local feature-hashing embedder. Deterministic, no network.
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    /// Vector size of the hashing embedder
    pub dimensions: usize,
    /// Model name for the remote backend
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Query embeddings kept in memory
    pub cache_capacity: u64,
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hashing,
            dimensions: 256,
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
            cache_capacity: 512,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Quality gate: passages scoring below this are dropped
    pub min_score: f32,
    pub max_results: usize,
    /// Neighbouring chunks fetched on each side by context expansion
    pub context_radius: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            min_score: 0.2,
            max_results: 6,
            context_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Persona ids to convene, in display order
    pub personas: Vec<String>,
    /// Upper bound on each persona's reasoning call
    pub persona_timeout_secs: u64,
    /// Below this many delivered opinions the responder answers from the
    /// retrieved passages alone
    pub min_opinions: usize,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            personas: vec![
                "litigator".to_string(),
                "judge".to_string(),
                "scholar".to_string(),
            ],
            persona_timeout_secs: 45,
            min_opinions: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Analyst classifications below this confidence take the direct path
    pub analyst_min_confidence: f32,
    /// Plans longer than this are rejected as unsupported
    pub max_plan_steps: usize,
    /// Prior messages from the request context forwarded to the model
    pub history_limit: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            analyst_min_confidence: 0.55,
            max_plan_steps: 8,
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file; defaults to ~/.counsel-desk/data.db
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    /// Statute corpus; defaults to ~/.counsel-desk/knowledge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_dir: Option<PathBuf>,
    /// Skip indexing the knowledge directory at startup
    #[serde(default)]
    pub skip_startup_index: bool,
}

impl AppConfig {
    /// Apply `COUNSEL_*` environment overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("COUNSEL_BIND") {
            self.server.bind = bind;
        }
        if let Some(model) = get("COUNSEL_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = get("COUNSEL_LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(api_key) = get("COUNSEL_LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }
        if let Some(path) = get("COUNSEL_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("COUNSEL_KNOWLEDGE_DIR") {
            self.storage.knowledge_dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind));
        }

        if self.llm.model.trim().is_empty() {
            return Err("llm.model cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err("llm.request_timeout_secs must be at least 1".to_string());
        }

        if self.embedding.backend == EmbeddingBackend::Hashing && self.embedding.dimensions < 16 {
            return Err("embedding.dimensions must be at least 16".to_string());
        }

        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(format!(
                "retrieval.min_score must be between 0 and 1, got {}",
                self.retrieval.min_score
            ));
        }
        if self.retrieval.max_results == 0 || self.retrieval.max_results > 50 {
            return Err("retrieval.max_results must be between 1 and 50".to_string());
        }
        if self.retrieval.context_radius > 5 {
            return Err("retrieval.context_radius cannot exceed 5".to_string());
        }

        if self.panel.persona_timeout_secs == 0 {
            return Err("panel.persona_timeout_secs must be at least 1".to_string());
        }
        if self.panel.min_opinions > self.panel.personas.len() {
            return Err("panel.min_opinions cannot exceed the number of personas".to_string());
        }

        if !(0.0..=1.0).contains(&self.router.analyst_min_confidence) {
            return Err("router.analyst_min_confidence must be between 0 and 1".to_string());
        }
        if self.router.max_plan_steps == 0 {
            return Err("router.max_plan_steps must be at least 1".to_string());
        }

        Ok(())
    }
}
