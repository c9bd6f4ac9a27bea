//! Gatekeeper fast path

use tokio_util::sync::CancellationToken;

use counsel_desk::models::chat::AgentType;
use counsel_desk::ChatRequest;

use crate::support::{analyst_reply, harness, ScriptedProvider, LAWYER};

#[tokio::test]
async fn test_greeting_makes_no_reasoning_call() {
    let h = harness(ScriptedProvider::new(), &[]).await;

    let response = h
        .state
        .router()
        .handle(&ChatRequest::new("مرحبا", LAWYER), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 0);
    assert_eq!(response.metadata.agent_type, Some(AgentType::Gatekeeper));
    assert!(!response.message.is_empty());
    assert!(response.metadata.execution_plan.is_none());
    assert!(response.metadata.workflow_plan.is_none());
}

#[tokio::test]
async fn test_english_thanks_is_fast_pathed() {
    let h = harness(ScriptedProvider::new(), &[]).await;

    let response = h
        .state
        .router()
        .handle(&ChatRequest::new("thanks!", LAWYER), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 0);
    assert_eq!(response.metadata.agent_type, Some(AgentType::Gatekeeper));
}

#[tokio::test]
async fn test_greeting_with_question_reaches_analyst() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("direct_answer"))
        .reply("router.responder.direct", "أهلاً، يمكنني مساعدتك في ذلك.");
    let h = harness(provider, &[]).await;

    let response = h
        .state
        .router()
        .handle(
            &ChatRequest::new("مرحبا، ما هي مدة الطعن بالاستئناف في القضايا المدنية؟", LAWYER),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        h.provider.calls(),
        vec!["router.analyst".to_string(), "router.responder.direct".to_string()]
    );
    assert_eq!(response.metadata.agent_type, Some(AgentType::Direct));
    assert_eq!(response.message, "أهلاً، يمكنني مساعدتك في ذلك.");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness(ScriptedProvider::new(), &[]).await;

    let err = h
        .state
        .router()
        .handle(&ChatRequest::new("   ", LAWYER), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("message cannot be empty"));
    assert_eq!(h.provider.call_count(), 0);
}
