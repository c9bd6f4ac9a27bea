//! Application State
//!
//! Shared state behind the HTTP handlers. Built once at startup; holds the
//! router and the stores it reads, and nothing turn-specific.

use std::sync::Arc;

use counsel_llm::{LlmProvider, OpenAIProvider};
use counsel_tools::AdminCatalogue;

use crate::models::response::HealthResponse;
use crate::models::settings::AppConfig;
use crate::services::admin::{build_admin_toolset, AdminExecutor, AdminPlanner, AdminReporter};
use crate::services::panel::DeliberationPanel;
use crate::services::retrieval::{
    build_embedding_provider, build_legal_toolset, HybridRetriever, IndexReport, KnowledgeIndexer,
};
use crate::services::router::{
    AdminBranch, Analyst, LegalBranch, Responder, RouterController, Strategist,
};
use crate::storage::{
    resolve_database_path, resolve_knowledge_dir, Database, KnowledgeStore, RecordStore,
    SqliteRecordStore,
};
use crate::utils::error::{AppError, AppResult};

pub struct AppState {
    config: AppConfig,
    /// SQLite database with connection pool
    database: Database,
    knowledge: KnowledgeStore,
    indexer: KnowledgeIndexer,
    provider: Arc<dyn LlmProvider>,
    router: Arc<RouterController>,
}

impl AppState {
    /// Open the configured database and reasoning provider, then wire every
    /// service.
    pub async fn initialize(config: AppConfig) -> AppResult<Self> {
        let db_path = resolve_database_path(&config)?;
        let database = tokio::task::spawn_blocking(move || Database::open(&db_path))
            .await
            .map_err(|e| AppError::internal(format!("database open task failed: {}", e)))??;
        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAIProvider::new(config.llm.clone())?);
        Self::from_parts(config, database, provider)
    }

    /// Wire services over an existing database and provider.
    pub fn from_parts(
        config: AppConfig,
        database: Database,
        provider: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        let embedder = build_embedding_provider(&config.embedding)
            .map_err(|e| AppError::config(format!("embedding backend: {}", e)))?;
        let knowledge = KnowledgeStore::new(database.clone());

        // Legal branch: knowledge search only
        let retriever = Arc::new(HybridRetriever::new(
            Arc::new(knowledge.clone()),
            embedder.clone(),
            config.retrieval.clone(),
            config.embedding.cache_capacity,
        ));
        let legal = LegalBranch::new(
            build_legal_toolset(retriever)?,
            DeliberationPanel::from_settings(provider.clone(), &config.panel)?,
        );

        // Admin branch: office records only
        let catalogue = Arc::new(AdminCatalogue::builtin());
        let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(database.clone()));
        let admin = AdminBranch::new(
            AdminPlanner::new(provider.clone(), catalogue.clone(), config.router.max_plan_steps),
            AdminExecutor::new(build_admin_toolset(&catalogue, records)?),
            AdminReporter::new(provider.clone()),
        );

        let router = RouterController::new(
            Analyst::new(provider.clone()),
            Strategist::new(config.router.analyst_min_confidence),
            legal,
            admin,
            Responder::new(provider.clone(), config.panel.min_opinions),
            config.router.history_limit,
        );

        Ok(Self {
            indexer: KnowledgeIndexer::new(knowledge.clone(), embedder),
            config,
            database,
            knowledge,
            provider,
            router: Arc::new(router),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> Arc<RouterController> {
        self.router.clone()
    }

    pub fn indexer(&self) -> &KnowledgeIndexer {
        &self.indexer
    }

    /// Index the configured knowledge directory.
    pub async fn index_knowledge(&self) -> AppResult<IndexReport> {
        let dir = resolve_knowledge_dir(&self.config)?;
        self.indexer.index_directory(&dir).await
    }

    /// Check if database is healthy
    pub fn is_database_healthy(&self) -> bool {
        self.database.is_healthy()
    }

    pub async fn health(&self) -> HealthResponse {
        let database = self.database.clone();
        let knowledge = self.knowledge.clone();
        let (database_ok, chunks) = tokio::task::spawn_blocking(move || {
            (database.is_healthy(), knowledge.chunk_count().unwrap_or(0))
        })
        .await
        .unwrap_or((false, 0));

        let mut health = HealthResponse {
            database: database_ok,
            config: self.config.validate().is_ok(),
            knowledge_chunks: chunks,
            llm_provider: format!("{}/{}", self.provider.name(), self.provider.model()),
            ..Default::default()
        };
        health.status = if health.database && health.config {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        };
        health
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bind", &self.config.server.bind)
            .field("provider", &self.provider.name())
            .finish()
    }
}
