//! Deliberation panel inside a legal turn

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use counsel_desk::models::settings::AppConfig;
use counsel_desk::ChatRequest;

use crate::support::{analyst_reply, harness_with, opinion_reply, ScriptedProvider, CIVIL_CODE, LAWYER};

const QUESTION: &str = "هل تصح هبة العقار دون توثيق بحسب المادة 368؟";

fn four_personas() -> AppConfig {
    let mut config = AppConfig::default();
    config.panel.personas = ["litigator", "judge", "scholar", "mediator"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    config
}

#[tokio::test]
async fn test_failed_persona_is_reported_unavailable() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("panel.litigator", opinion_reply("الهبة غير الموثقة قابلة للطعن."))
        .reply("panel.judge", opinion_reply("المحكمة تقضي ببطلانها."))
        .reply("panel.scholar", opinion_reply("التوثيق ركن في هبة العقار."))
        .reply("router.responder.legal", "وفق المادة 368 لا تتم هبة العقار إلا بالتوثيق.");
    let h = harness_with(provider, &[("jordan/civil_code.txt", CIVIL_CODE)], four_personas()).await;

    let response = h
        .state
        .router()
        .handle(&ChatRequest::new(QUESTION, LAWYER), &CancellationToken::new())
        .await
        .unwrap();

    let panel = &response.metadata.workflow_plan.unwrap()["panel"]["opinions"];
    let opinions = panel.as_object().unwrap();
    assert_eq!(opinions.len(), 4);
    assert_eq!(panel["mediator"]["status"], "unavailable");
    for id in ["litigator", "judge", "scholar"] {
        assert_eq!(panel[id]["status"], "delivered", "persona {}", id);
        assert!(panel[id]["opinion"]["rationale"].is_string());
    }
    assert_eq!(response.message, "وفق المادة 368 لا تتم هبة العقار إلا بالتوثيق.");
}

#[tokio::test]
async fn test_slow_persona_times_out_without_blocking_turn() {
    let mut config = AppConfig::default();
    config.panel.persona_timeout_secs = 1;
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("panel", opinion_reply("التوثيق شرط."))
        .delay("panel.judge", Duration::from_secs(5))
        .reply("router.responder.legal", "المادة 368 تشترط التوثيق.");
    let h = harness_with(provider, &[("jordan/civil_code.txt", CIVIL_CODE)], config).await;

    let started = std::time::Instant::now();
    let response = h
        .state
        .router()
        .handle(&ChatRequest::new(QUESTION, LAWYER), &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    let panel = &response.metadata.workflow_plan.unwrap()["panel"]["opinions"];
    assert_eq!(panel["judge"]["status"], "unavailable");
    assert_eq!(panel["litigator"]["status"], "delivered");
    assert_eq!(panel["scholar"]["status"], "delivered");
}

#[tokio::test]
async fn test_all_personas_down_still_answers_from_passages() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("router.responder.legal", "المادة 368 تشترط توثيق هبة العقار.");
    let h = harness_with(provider, &[("jordan/civil_code.txt", CIVIL_CODE)], AppConfig::default()).await;

    let response = h
        .state
        .router()
        .handle(&ChatRequest::new(QUESTION, LAWYER), &CancellationToken::new())
        .await
        .unwrap();

    let panel = &response.metadata.workflow_plan.unwrap()["panel"]["opinions"];
    assert_eq!(panel.as_object().unwrap().len(), 3);
    assert_eq!(response.message, "المادة 368 تشترط توثيق هبة العقار.");
}
