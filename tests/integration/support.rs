//! Shared fixtures: a scripted reasoning provider and an in-memory app.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;

use counsel_desk::models::settings::AppConfig;
use counsel_desk::storage::{Database, RecordStore, SqliteRecordStore};
use counsel_desk::AppState;
use counsel_llm::{
    LlmError, LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig,
    ToolDefinition,
};
use counsel_tools::EntityKind;

pub const OFFICE: &str = "office-1";
pub const LAWYER: &str = "lawyer-1";

/// Replies by pipeline stage and records every call it receives.
///
/// A `panel` reply answers every persona without a reply of its own. A
/// stage with no scripted reply fails with a provider error, which is how
/// tests make a persona or stage unavailable.
pub struct ScriptedProvider {
    replies: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    config: ProviderConfig,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            config: ProviderConfig::default(),
        }
    }

    pub fn reply(mut self, stage: &str, text: impl Into<String>) -> Self {
        self.replies.insert(stage.to_string(), text.into());
        self
    }

    /// Hold replies for `stage` back by `delay`.
    pub fn delay(mut self, stage: &str, delay: Duration) -> Self {
        self.delays.insert(stage.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    async fn send_message(
        &self,
        _messages: Vec<Message>,
        _system: Option<String>,
        _tools: Vec<ToolDefinition>,
        options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let stage = options.stage.unwrap_or_default();
        self.calls.lock().unwrap().push(stage.clone());
        if let Some(delay) = self.delays.get(&stage) {
            tokio::time::sleep(*delay).await;
        }
        let reply = self.replies.get(&stage).or_else(|| {
            stage
                .starts_with("panel.")
                .then(|| self.replies.get("panel"))
                .flatten()
        });
        match reply {
            Some(text) => Ok(LlmResponse::from_text(text.clone(), "scripted-model")),
            None => Err(LlmError::Other {
                message: format!("no scripted reply for stage '{}'", stage),
            }),
        }
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub provider: Arc<ScriptedProvider>,
    pub records: SqliteRecordStore,
    _knowledge_dir: TempDir,
}

impl Harness {
    /// Insert a record for the test office and return its id.
    pub fn seed(&self, entity: EntityKind, values: Value) -> i64 {
        let values: Map<String, Value> = values.as_object().cloned().unwrap();
        let row = self.records.insert(OFFICE, entity, &values).unwrap();
        row["id"].as_i64().unwrap()
    }
}

/// App over an in-memory database with `documents` indexed from a
/// temporary knowledge directory. Each document is `(relative path, text)`.
pub async fn harness_with(provider: ScriptedProvider, documents: &[(&str, &str)], config: AppConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    for (path, text) in documents {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, text).unwrap();
    }

    let mut config = config;
    config.storage.knowledge_dir = Some(dir.path().to_path_buf());

    let database = Database::new_in_memory().unwrap();
    let provider = Arc::new(provider);
    let state = Arc::new(AppState::from_parts(config, database.clone(), provider.clone()).unwrap());
    state.index_knowledge().await.unwrap();

    Harness {
        state,
        provider,
        records: SqliteRecordStore::new(database),
        _knowledge_dir: dir,
    }
}

pub async fn harness(provider: ScriptedProvider, documents: &[(&str, &str)]) -> Harness {
    harness_with(provider, documents, AppConfig::default()).await
}

/// A civil code excerpt with articles 367 to 369.
pub const CIVIL_CODE: &str = "القانون المدني\n\
المادة 367\n\
تنعقد الهبة بالإيجاب والقبول وتتم بالقبض.\n\
المادة 368\n\
هبة العقار لا تتم إلا بالتسجيل والتوثيق لدى دائرة الأراضي، وتقع باطلة إذا لم توثق.\n\
المادة 369\n\
للواهب أن يرجع في الهبة برضا الموهوب له.\n";

pub fn analyst_reply(intent: &str) -> String {
    format!(
        r#"{{"intent": "{}", "confidence": 0.9, "reasoning": "scripted"}}"#,
        intent
    )
}

pub fn opinion_reply(statement: &str) -> String {
    format!(
        r#"{{"rationale": "reading of the excerpt", "statement": "{}"}}"#,
        statement
    )
}
