//! Hybrid retrieval: numeral equivalence, exact-match ranking, and the
//! legal path end to end.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use counsel_desk::models::chat::AgentType;
use counsel_desk::models::settings::RetrievalSettings;
use counsel_desk::services::retrieval::{HashingEmbedder, HybridRetriever, KnowledgeIndexer};
use counsel_desk::storage::{Database, KnowledgeStore, SourceMeta};
use counsel_desk::ChatRequest;

use crate::support::{analyst_reply, harness, opinion_reply, ScriptedProvider, CIVIL_CODE, LAWYER};

const PLEDGE_LAW: &str = "المادة ثلاثمائة وسبعون\n\
يشترط لنفاذ الرهن الحيازي في حق الغير أن يكون المال المرهون في يد الدائن المرتهن.\n\
المادة ثلاثمائة وواحد وسبعون\n\
يلتزم الدائن المرتهن بالمحافظة على المال المرهون.\n";

async fn retriever() -> HybridRetriever {
    let store = KnowledgeStore::new(Database::new_in_memory().unwrap());
    let embedder = Arc::new(HashingEmbedder::new(256));
    let indexer = KnowledgeIndexer::new(store.clone(), embedder.clone());

    indexer
        .index_document(
            &SourceMeta {
                source_id: "jordan/civil_code".into(),
                title: "civil code".into(),
                country: "jordan".into(),
            },
            CIVIL_CODE,
        )
        .await
        .unwrap();
    indexer
        .index_document(
            &SourceMeta {
                source_id: "jordan/pledge_law".into(),
                title: "pledge law".into(),
                country: "jordan".into(),
            },
            PLEDGE_LAW,
        )
        .await
        .unwrap();

    HybridRetriever::new(Arc::new(store), embedder, RetrievalSettings::default(), 64)
}

#[tokio::test]
async fn test_spelled_and_digit_citations_find_same_article() {
    let retriever = retriever().await;

    for query in [
        "ما نص المادة 368؟",
        "ما نص المادة ثلاثمائة وثمانية وستون؟",
        "ما نص المادة ٣٦٨؟",
    ] {
        let outcome = retriever.search(query, query, None, None).await.unwrap();
        let top = &outcome.passages[0];
        assert_eq!(top.header, "المادة 368", "query: {}", query);
        assert!(top.exact_phrase_match, "query: {}", query);
        assert!(top.similarity_score >= 0.75, "query: {}", query);
    }
}

#[tokio::test]
async fn test_digit_query_matches_spelled_header() {
    let retriever = retriever().await;

    for query in ["ما نص المادة 370؟", "What does Article 370 say?"] {
        let outcome = retriever.search(query, query, None, None).await.unwrap();
        let top = &outcome.passages[0];
        assert_eq!(top.header, "المادة ثلاثمائة وسبعون", "query: {}", query);
        assert!(top.exact_phrase_match);
        assert!(top.similarity_score >= 0.75);
    }
}

#[tokio::test]
async fn test_exact_match_outranks_related_articles() {
    let retriever = retriever().await;

    let outcome = retriever
        .search("المادة 369", "الرجوع في الهبة", None, None)
        .await
        .unwrap();

    assert_eq!(outcome.passages[0].header, "المادة 369");
    for passage in &outcome.passages[1..] {
        assert!(!passage.exact_phrase_match);
        assert!(passage.similarity_score < outcome.passages[0].similarity_score);
        assert!(passage.similarity_score < 0.75);
    }
}

#[tokio::test]
async fn test_country_filter_excludes_other_jurisdictions() {
    let retriever = retriever().await;

    let outcome = retriever
        .search("المادة 368", "هبة العقار", Some("egypt"), None)
        .await
        .unwrap();

    assert!(outcome.passages.is_empty());
}

#[tokio::test]
async fn test_legal_turn_reports_exact_passage() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("panel", opinion_reply("يجب توثيق الهبة لدى دائرة الأراضي."))
        .reply("router.responder.legal", "تشترط المادة 368 توثيق هبة العقار لدى دائرة الأراضي.");
    let h = harness(provider, &[("jordan/civil_code.txt", CIVIL_CODE)]).await;

    let response = h
        .state
        .router()
        .handle(
            &ChatRequest::new("ما نص المادة ثلاثمائة وثمانية وستون بشأن هبة العقار؟", LAWYER),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.metadata.agent_type, Some(AgentType::LegalResearch));
    assert_eq!(
        response.message,
        "تشترط المادة 368 توثيق هبة العقار لدى دائرة الأراضي."
    );

    let plan = response.metadata.workflow_plan.unwrap();
    let top = &plan["passages"][0];
    assert_eq!(top["header"], "المادة 368");
    assert_eq!(top["exact_phrase_match"], true);
    assert!(top["similarity_score"].as_f64().unwrap() >= 0.75);
    assert!(response.metadata.execution_plan.is_none());
    assert!(response.metadata.execution_results.is_none());
}

#[tokio::test]
async fn test_invented_citation_falls_back_to_passage_list() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("panel", opinion_reply("يجب توثيق الهبة."))
        .reply("router.responder.legal", "وفقاً للمادة 999 تبطل الهبة.");
    let h = harness(provider, &[("jordan/civil_code.txt", CIVIL_CODE)]).await;

    let response = h
        .state
        .router()
        .handle(
            &ChatRequest::new("ما حكم هبة العقار غير الموثقة وفق المادة 368؟", LAWYER),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!response.message.contains("999"));
    assert!(response.message.contains("المادة 368"));
}

#[tokio::test]
async fn test_empty_knowledge_base_states_no_source() {
    let provider = ScriptedProvider::new()
        .reply("router.analyst", analyst_reply("legal_research"))
        .reply("router.responder.legal", "المادة 12 تنص على ذلك.");
    let h = harness(provider, &[]).await;

    let response = h
        .state
        .router()
        .handle(
            &ChatRequest::new("ما هي شروط صحة عقد الكفالة؟", LAWYER),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.message.contains("لم أجد نصاً قانونياً موثوقاً"));
    let calls = h.provider.calls();
    assert!(!calls.iter().any(|c| c == "router.responder.legal"));
    assert!(!calls.iter().any(|c| c.starts_with("panel.")));
}
