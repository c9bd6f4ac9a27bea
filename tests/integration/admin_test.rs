//! Admin sub-graph: planning guards, per-step results, tenant scoping.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use counsel_core::OrchestratorContext;
use counsel_desk::models::chat::AgentType;
use counsel_desk::services::admin::reporter::template_report;
use counsel_desk::services::admin::{build_admin_toolset, AdminExecutor, AdminPlanner, PlanOutcome};
use counsel_desk::storage::{Database, RecordStore, SqliteRecordStore};
use counsel_desk::{AppResult, ChatMode, ChatRequest};
use counsel_tools::{AdminCatalogue, EntityKind, FailureKind, InvocationLog, StepStatus};

use crate::support::{analyst_reply, harness, Harness, ScriptedProvider, LAWYER, OFFICE};

fn admin_request(message: &str) -> ChatRequest {
    ChatRequest::new(message, LAWYER)
        .with_office(OFFICE)
        .with_mode(ChatMode::Admin)
}

fn seed_case(h: &Harness) -> i64 {
    let client = h.seed(
        EntityKind::Client,
        json!({"full_name": "سامر خليل", "phone": "0790000000"}),
    );
    h.seed(
        EntityKind::Case,
        json!({"client_id": client, "title": "نزاع إيجار", "status": "open"}),
    )
}

fn count(h: &Harness, entity: EntityKind) -> usize {
    h.records
        .query(OFFICE, entity, &Map::new(), None)
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_delete_without_id_asks_instead_of_deleting() {
    let plan = r#"{"status": "ready", "summary": "delete the client", "steps": [
        {"tool": "delete_client", "params": {"id": 1}, "destructive": true}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let response = h
        .state
        .router()
        .handle(&admin_request("احذف العميل سامر"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.metadata.agent_type, Some(AgentType::Admin));
    let plan = response.metadata.execution_plan.unwrap();
    assert_eq!(plan["status"], "insufficient_information");
    assert!(response.metadata.execution_results.is_none());
    assert_eq!(count(&h, EntityKind::Client), 1);
    assert!(!h.provider.calls().iter().any(|c| c == "admin.reporter"));
}

#[tokio::test]
async fn test_delete_not_explicitly_requested_is_held_back() {
    let plan = r#"{"status": "ready", "steps": [
        {"tool": "delete_case", "params": {"id": 1}, "destructive": true}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let response = h
        .state
        .router()
        .handle(&admin_request("the case 1 is finished, clean it up"), &CancellationToken::new())
        .await
        .unwrap();

    let plan = response.metadata.execution_plan.unwrap();
    assert_eq!(plan["status"], "insufficient_information");
    assert_eq!(plan["missing"][0], "delete_confirmation");
    assert_eq!(count(&h, EntityKind::Case), 1);
}

#[tokio::test]
async fn test_failed_step_does_not_stop_independent_steps() {
    let plan = r#"{"status": "ready", "summary": "close case and schedule hearings", "steps": [
        {"tool": "update_case", "params": {"id": 1, "status": "closed"}},
        {"tool": "insert_hearing", "params": {"case_id": 999, "hearing_date": "2026-11-02"}},
        {"tool": "insert_hearing", "params": {"case_id": 1, "hearing_date": "2026-11-09"}}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[]).await;
    assert_eq!(seed_case(&h), 1);

    let response = h
        .state
        .router()
        .handle(
            &admin_request(
                "أغلق القضية 1 وأضف جلسة للقضية 999 بتاريخ 2026-11-02 وجلسة للقضية 1 بتاريخ 2026-11-09",
            ),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let results = response.metadata.execution_results.unwrap();
    let statuses: Vec<StepStatus> = results.iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![StepStatus::Succeeded, StepStatus::Failed, StepStatus::Succeeded]
    );
    assert_eq!(
        results.iter().map(|r| r.step()).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(results[1].error().unwrap().contains("999"));

    assert_eq!(count(&h, EntityKind::Hearing), 1);
    let case = h
        .records
        .query(OFFICE, EntityKind::Case, json!({"id": 1}).as_object().unwrap(), None)
        .unwrap();
    assert_eq!(case[0]["status"], "closed");

    // Reporter was unscripted, so the template names every step
    assert!(response.message.contains("✗ الخطوة 2"));
    assert!(response.message.contains("✓ الخطوة 3"));
    assert!(response.message.contains("السجل المشار إليه غير موجود"));
    for raw in ["Not found:", "SQLite", "hearing.case_id"] {
        assert!(!response.message.contains(raw), "reply leaked {raw}");
    }
}

#[tokio::test]
async fn test_dependent_step_skipped_after_failure() {
    let plan = r#"{"status": "ready", "steps": [
        {"tool": "update_case", "params": {"id": 12, "status": "closed"}},
        {"tool": "insert_task", "params": {"title": "archive file", "case_id": "$step1.id"}}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let response = h
        .state
        .router()
        .handle(
            &admin_request("close case 12 and add a task to archive its file"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let results = response.metadata.execution_results.unwrap();
    assert_eq!(results[0].status(), StepStatus::Failed);
    assert_eq!(results[1].status(), StepStatus::Skipped);
    assert_eq!(count(&h, EntityKind::Task), 0);
}

#[tokio::test]
async fn test_repeated_read_steps_return_same_rows() {
    let plan = r#"{"status": "ready", "steps": [
        {"tool": "query_client", "params": {"full_name": "سامر"}},
        {"tool": "query_client", "params": {"full_name": "سامر"}}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan)
        .reply("admin.reporter", "وجدت عميلاً واحداً باسم سامر.");
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let response = h
        .state
        .router()
        .handle(&admin_request("ابحث عن العميل سامر"), &CancellationToken::new())
        .await
        .unwrap();

    let results = response.metadata.execution_results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status(), results[1].status());
    assert_eq!(results[0].output(), results[1].output());
    assert_eq!(results[0].output().unwrap().as_array().unwrap().len(), 1);
    assert_eq!(response.message, "وجدت عميلاً واحداً باسم سامر.");
}

#[tokio::test]
async fn test_other_office_cannot_touch_records() {
    let plan = r#"{"status": "ready", "steps": [
        {"tool": "update_case", "params": {"id": 1, "status": "closed"}}
    ]}"#;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("admin.planner", plan);
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let request = ChatRequest::new("close case 1", LAWYER)
        .with_office("office-2")
        .with_mode(ChatMode::Admin);
    let response = h
        .state
        .router()
        .handle(&request, &CancellationToken::new())
        .await
        .unwrap();

    let results = response.metadata.execution_results.unwrap();
    assert_eq!(results[0].status(), StepStatus::Failed);
    let case = h
        .records
        .query(OFFICE, EntityKind::Case, &Map::new(), None)
        .unwrap();
    assert_eq!(case[0]["status"], "open");
}

#[tokio::test]
async fn test_research_mode_keeps_admin_request_off_records() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("admin_action"))
        .reply("router.responder.direct", "This session is in research mode.");
    let h = harness(provider, &[]).await;
    seed_case(&h);

    let request = ChatRequest::new("close case 1", LAWYER)
        .with_office(OFFICE)
        .with_mode(ChatMode::Research);
    let response = h
        .state
        .router()
        .handle(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.metadata.agent_type, Some(AgentType::Direct));
    assert!(response.metadata.execution_plan.is_none());
    assert!(!h.provider.calls().iter().any(|c| c == "admin.planner"));
    assert_eq!(
        response.metadata.cognitive_decision.unwrap()["direct_reason"],
        "mode_restricted"
    );
}

/// Record store that cancels the turn as soon as a write commits.
struct CancelAfterWrite {
    inner: SqliteRecordStore,
    cancel: CancellationToken,
}

impl CancelAfterWrite {
    fn committed(&self, row: AppResult<Value>) -> AppResult<Value> {
        if row.is_ok() {
            self.cancel.cancel();
        }
        row
    }
}

impl RecordStore for CancelAfterWrite {
    fn query(
        &self,
        office: &str,
        entity: EntityKind,
        filters: &Map<String, Value>,
        limit: Option<usize>,
    ) -> AppResult<Vec<Value>> {
        self.inner.query(office, entity, filters, limit)
    }

    fn insert(&self, office: &str, entity: EntityKind, values: &Map<String, Value>) -> AppResult<Value> {
        self.committed(self.inner.insert(office, entity, values))
    }

    fn update(
        &self,
        office: &str,
        entity: EntityKind,
        id: i64,
        changes: &Map<String, Value>,
    ) -> AppResult<Value> {
        self.committed(self.inner.update(office, entity, id, changes))
    }

    fn delete(&self, office: &str, entity: EntityKind, id: i64) -> AppResult<Value> {
        self.committed(self.inner.delete(office, entity, id))
    }
}

#[tokio::test]
async fn test_cancel_mid_plan_keeps_committed_step() {
    let reply = r#"{"status": "ready", "summary": "add client and close case", "steps": [
        {"tool": "insert_client", "params": {"full_name": "Lina Haddad"}},
        {"tool": "update_case", "params": {"id": 1, "status": "closed"}}
    ]}"#;
    let catalogue = Arc::new(AdminCatalogue::builtin());
    let planner = AdminPlanner::new(
        Arc::new(ScriptedProvider::new().reply("admin.planner", reply)),
        catalogue.clone(),
        8,
    );
    let outcome = planner
        .plan("add client Lina Haddad and close case 1", &[])
        .await
        .unwrap();
    let PlanOutcome::Ready { plan } = outcome else {
        panic!("expected a ready plan, got {outcome:?}");
    };

    let db = Database::new_in_memory().unwrap();
    let cancel = CancellationToken::new();
    let store: Arc<dyn RecordStore> = Arc::new(CancelAfterWrite {
        inner: SqliteRecordStore::new(db.clone()),
        cancel: cancel.clone(),
    });
    let executor = AdminExecutor::new(build_admin_toolset(&catalogue, store).unwrap());
    let ctx = OrchestratorContext::new("turn-1", "session-1", OFFICE, LAWYER).unwrap();
    let log = InvocationLog::new();

    let results = executor.execute(&plan, &ctx, &log, &cancel).await;

    assert!(cancel.is_cancelled());
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status(), StepStatus::Succeeded);
    assert_eq!(results[1].status(), StepStatus::Skipped);
    assert_eq!(results[1].error(), Some("cancelled before execution"));
    assert_eq!(results[1].failure(), Some(FailureKind::Cancelled));
    assert_eq!(log.snapshot().len(), 1);

    let clients = SqliteRecordStore::new(db)
        .query(OFFICE, EntityKind::Client, &Map::new(), None)
        .unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["full_name"], "Lina Haddad");

    let report = template_report(&plan, &results, false);
    assert!(report.contains("✓ Step 1 (insert_client): created client #"));
    assert!(report.contains(
        "- Step 2 (update_case): skipped: the request was cancelled before this step ran"
    ));
}
