//! Capability partitions: each branch reaches only its own tools.

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use counsel_core::OrchestratorContext;
use counsel_desk::models::settings::RetrievalSettings;
use counsel_desk::services::admin::build_admin_toolset;
use counsel_desk::services::retrieval::tools::{EXPAND_CONTEXT, SEARCH_KNOWLEDGE};
use counsel_desk::services::retrieval::{build_legal_toolset, HashingEmbedder, HybridRetriever};
use counsel_desk::storage::{Database, KnowledgeStore, RecordStore, SqliteRecordStore};
use counsel_desk::{ChatMode, ChatRequest};
use counsel_tools::{AdminCatalogue, EntityKind, InvocationLog};

use crate::support::{
    analyst_reply, harness, opinion_reply, ScriptedProvider, CIVIL_CODE, LAWYER, OFFICE,
};

#[tokio::test]
async fn test_legal_turn_only_touches_legal_tools() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("panel", opinion_reply("التوثيق شرط."))
        .reply("router.responder.legal", "المادة 368 تشترط التوثيق.");
    let h = harness(provider, &[("jordan/civil_code.txt", CIVIL_CODE)]).await;

    let turn = h
        .state
        .router()
        .process(
            &ChatRequest::new("ما نص المادة 368 في الهبة؟", LAWYER),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let calls = turn.invocations.snapshot();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|c| c.partition == "legal"));
    assert_eq!(calls[0].tool, SEARCH_KNOWLEDGE);
}

#[tokio::test]
async fn test_admin_turn_only_touches_admin_tools() {
    let plan = r#"{"status": "ready", "steps": [
        {"tool": "insert_client", "params": {"full_name": "Lina Haddad", "phone": "0791111111"}}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[("jordan/civil_code.txt", CIVIL_CODE)]).await;

    let request = ChatRequest::new("add client Lina Haddad, phone 0791111111", LAWYER)
        .with_office(OFFICE)
        .with_mode(ChatMode::Admin);
    let turn = h
        .state
        .router()
        .process(&request, &CancellationToken::new())
        .await
        .unwrap();

    let calls = turn.invocations.snapshot();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].partition, "admin");
    assert_eq!(calls[0].tool, "insert_client");
    assert!(calls[0].success);
}

#[tokio::test]
async fn test_toolsets_do_not_share_tools() {
    let db = Database::new_in_memory().unwrap();
    let retriever = Arc::new(HybridRetriever::new(
        Arc::new(KnowledgeStore::new(db.clone())),
        Arc::new(HashingEmbedder::new(64)),
        RetrievalSettings::default(),
        8,
    ));
    let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(db.clone()));
    let legal = build_legal_toolset(retriever).unwrap();
    let admin = build_admin_toolset(&AdminCatalogue::builtin(), records.clone()).unwrap();

    assert_eq!(legal.names().len(), 2);
    assert!(legal.contains(SEARCH_KNOWLEDGE) && legal.contains(EXPAND_CONTEXT));
    assert!(!legal.names().iter().any(|n| admin.contains(n)));
    assert!(!admin.contains(SEARCH_KNOWLEDGE));

    // A write name offered to the legal toolset resolves to nothing
    let client = records
        .insert(
            OFFICE,
            EntityKind::Client,
            json!({"full_name": "Omar"}).as_object().unwrap(),
        )
        .unwrap();
    let ctx = OrchestratorContext::new("turn-1", "session-1", OFFICE, LAWYER)
        .unwrap()
        .create_tool_context("call-1");
    let log = InvocationLog::new();
    let result = legal
        .invoke("delete_client", &ctx, json!({"id": client["id"]}), &log)
        .await;

    assert!(result.is_err());
    assert_eq!(
        records
            .query(OFFICE, EntityKind::Client, &serde_json::Map::new(), None)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(log.snapshot()[0].partition, "legal");
    assert!(!log.snapshot()[0].success);
}
