//! HTTP surface over a real listener

use serde_json::{json, Value};

use counsel_desk::api_router;

use crate::support::{harness, Harness, ScriptedProvider, CIVIL_CODE};

async fn serve(h: &Harness) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api_router(h.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_chat_endpoint_answers_greeting() {
    let h = harness(ScriptedProvider::new(), &[]).await;
    let base = serve(&h).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "hello", "lawyer_id": "lawyer-1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["metadata"]["agent_type"], "gatekeeper");
    assert!(body["data"]["metadata"].get("execution_plan").is_none());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn test_blank_message_is_bad_request() {
    let h = harness(ScriptedProvider::new(), &[]).await;
    let base = serve(&h).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "  ", "lawyer_id": "lawyer-1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "message cannot be empty");
    assert!(body.get("data").map(Value::is_null).unwrap_or(true));
}

#[tokio::test]
async fn test_health_reports_indexed_chunks() {
    let h = harness(ScriptedProvider::new(), &[("jordan/civil_code.txt", CIVIL_CODE)]).await;
    let base = serve(&h).await;

    let body: Value = reqwest::get(format!("{}/api/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["service"], "counsel-desk");
    assert!(body["data"]["knowledge_chunks"].as_u64().unwrap() >= 3);
    assert_eq!(body["data"]["llm_provider"], "scripted/scripted-model");
}
