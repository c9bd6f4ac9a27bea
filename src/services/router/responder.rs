//! Responder
//!
//! Last router stage. Builds the reply text from whatever the chosen branch
//! produced. It never reports a failure raw: a branch error becomes an
//! apology, an empty retrieval becomes a "no authoritative source" reply,
//! and a synthesized legal answer that cites an article the passages do not
//! contain is replaced by a plain listing of the passages.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use counsel_llm::{LlmProvider, LlmRequestOptions, Message};

use super::branches::{AdminFindings, LegalFindings};
use super::turn::cancellable;
use crate::services::admin::PlanOutcome;
use crate::services::gatekeeper::FastResult;
use crate::services::retrieval::normalize::{has_arabic, prepare_text};
use crate::services::retrieval::numerals::{extract_citations, Citation};
use crate::services::retrieval::Passage;

const MAX_PASSAGE_CHARS: usize = 1500;

const DIRECT_SYSTEM_PROMPT: &str = "You are the assistant of a law office. Answer the lawyer briefly \
in the language of their message. You have not searched any statute and have not read or changed any \
office record in this turn, so never claim to have done either and never quote article numbers. \
If the message needs a statute or a record, say so and suggest asking for it explicitly.";

const LEGAL_SYSTEM_PROMPT: &str = "You are the research assistant of a law office. Answer the lawyer's \
question in the language of the question using ONLY the statute excerpts and panel views provided. \
Cite articles exactly as they appear in the excerpts. Do not cite any article, date or figure that is \
not in the excerpts. If the excerpts do not settle the question, say so.";

pub struct Responder {
    provider: Arc<dyn LlmProvider>,
    min_opinions: usize,
}

impl Responder {
    pub fn new(provider: Arc<dyn LlmProvider>, min_opinions: usize) -> Self {
        Self {
            provider,
            min_opinions,
        }
    }

    pub fn fast(&self, result: &FastResult) -> String {
        result.reply.clone()
    }

    pub async fn direct(&self, request: &str, history: &[Message], cancel: &CancellationToken) -> String {
        let mut messages = history.to_vec();
        messages.push(Message::user(request));
        let call = self.provider.send_message(
            messages,
            Some(DIRECT_SYSTEM_PROMPT.to_string()),
            vec![],
            LlmRequestOptions::prose("router.responder.direct"),
        );
        match cancellable(cancel, call).await {
            Some(Ok(response)) if !response.text().trim().is_empty() => response.text().trim().to_string(),
            Some(Ok(_)) => apology(has_arabic(request)),
            Some(Err(e)) => {
                warn!(error = %e, "direct answer failed");
                apology(has_arabic(request))
            }
            None => apology(has_arabic(request)),
        }
    }

    pub async fn legal(&self, request: &str, findings: &LegalFindings, cancel: &CancellationToken) -> String {
        let arabic = has_arabic(request);
        let passages = &findings.retrieval.passages;
        if passages.is_empty() {
            return no_source(arabic);
        }

        let mut prompt = format!("Question:\n{}\n\nStatute excerpts:\n", request.trim());
        for (i, passage) in passages.iter().enumerate() {
            prompt.push_str(&format!(
                "[{}] {} ({})\n{}\n\n",
                i + 1,
                passage.header,
                passage.source_title,
                clip(&passage.content, MAX_PASSAGE_CHARS)
            ));
        }
        if let Some(panel) = findings
            .panel
            .as_ref()
            .filter(|p| p.delivered_count() >= self.min_opinions.max(1))
        {
            prompt.push_str("Panel views:\n");
            for (persona, opinion) in panel.delivered() {
                prompt.push_str(&format!("- {}: {}\n", persona, opinion.statement));
            }
        }

        let call = self.provider.send_message(
            vec![Message::user(prompt)],
            Some(LEGAL_SYSTEM_PROMPT.to_string()),
            vec![],
            LlmRequestOptions::prose("router.responder.legal"),
        );
        match cancellable(cancel, call).await {
            Some(Ok(response)) if !response.text().trim().is_empty() => {
                let text = response.text().trim().to_string();
                if cites_only_known_articles(&text, passages) {
                    return text;
                }
                warn!("legal answer cited an article outside the retrieved passages, listing passages instead");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => warn!(error = %e, "legal synthesis failed, listing passages instead"),
            None => {}
        }
        list_passages(passages, arabic)
    }

    pub fn admin(&self, request: &str, findings: &AdminFindings) -> String {
        let arabic = has_arabic(request);
        match (&findings.outcome, &findings.report) {
            (PlanOutcome::Ready { .. }, Some(report)) => report.text.clone(),
            (PlanOutcome::Ready { .. }, None) => apology(arabic),
            (PlanOutcome::InsufficientInformation { question, .. }, _) => question.clone(),
            (PlanOutcome::Unsupported { .. }, _) if arabic => {
                "لم أتمكن من مطابقة هذا الطلب مع عمليات سجلات المكتب المتاحة. هل يمكنك إعادة صياغته؟".to_string()
            }
            (PlanOutcome::Unsupported { .. }, _) => {
                "I couldn't match this request to an available office record operation. Could you rephrase it?"
                    .to_string()
            }
        }
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}

/// Whether every article `reply` cites occurs in the passages.
pub fn cites_only_known_articles(reply: &str, passages: &[Passage]) -> bool {
    let known: HashSet<Citation> = passages
        .iter()
        .flat_map(|p| {
            extract_citations(&prepare_text(&format!("{}\n{}", p.header, p.content)))
        })
        .collect();
    extract_citations(&prepare_text(reply))
        .iter()
        .all(|c| known.contains(c))
}

fn list_passages(passages: &[Passage], arabic: bool) -> String {
    let mut out = if arabic {
        "وجدت النصوص التالية ذات الصلة بسؤالك:\n".to_string()
    } else {
        "These provisions are relevant to your question:\n".to_string()
    };
    for passage in passages {
        out.push_str(&format!(
            "\n• {} ({}): {}",
            passage.header, passage.source_title, passage.snippet
        ));
    }
    out
}

pub fn no_source(arabic: bool) -> String {
    if arabic {
        "لم أجد نصاً قانونياً موثوقاً في قاعدة المعرفة يجيب عن هذا السؤال، لذلك لن أقدم إجابة قد تكون غير دقيقة. جرّب ذكر رقم المادة أو اسم القانون."
            .to_string()
    } else {
        "I couldn't find an authoritative source in the knowledge base for this question, so I won't guess. Try naming the article or the law."
            .to_string()
    }
}

pub fn apology(arabic: bool) -> String {
    if arabic {
        "عذراً، لم أتمكن من إتمام هذا الطلب الآن. يرجى المحاولة مرة أخرى بعد قليل.".to_string()
    } else {
        "Sorry, I couldn't complete this request right now. Please try again in a moment.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retrieval::RetrievalOutcome;
    use crate::services::router::strategist::LegalQuery;
    use async_trait::async_trait;
    use counsel_llm::{LlmResponse, LlmResult, ProviderConfig, ToolDefinition};

    struct Fixed {
        reply: String,
        config: ProviderConfig,
    }

    #[async_trait]
    impl LlmProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }
        fn model(&self) -> &str {
            "test"
        }
        fn supports_tools(&self) -> bool {
            false
        }
        async fn send_message(
            &self,
            _messages: Vec<Message>,
            _system: Option<String>,
            _tools: Vec<ToolDefinition>,
            _options: LlmRequestOptions,
        ) -> LlmResult<LlmResponse> {
            Ok(LlmResponse::from_text(self.reply.clone(), "test"))
        }
        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }
        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    fn responder(reply: &str) -> Responder {
        Responder::new(
            Arc::new(Fixed {
                reply: reply.to_string(),
                config: ProviderConfig::default(),
            }),
            1,
        )
    }

    fn passage(header: &str, content: &str) -> Passage {
        Passage {
            chunk_id: 1,
            source_id: "src".into(),
            source_title: "Civil Code".into(),
            country: "jordan".into(),
            header: header.into(),
            snippet: content.into(),
            content: content.into(),
            similarity_score: 0.9,
            semantic_similarity: 0.8,
            lexical_overlap: 0.5,
            exact_phrase_match: true,
            chunk_index: 0,
            start_offset: 0,
            end_offset: content.len(),
        }
    }

    fn findings(passages: Vec<Passage>) -> LegalFindings {
        LegalFindings {
            query: LegalQuery::compose("Article 368", None),
            retrieval: RetrievalOutcome {
                passages,
                ..Default::default()
            },
            context: None,
            panel: None,
        }
    }

    #[test]
    fn test_citation_guard() {
        let passages = vec![passage("Article 368", "A gift of real estate must be registered.")];
        assert!(cites_only_known_articles("Under Article 368 the gift must be registered.", &passages));
        assert!(cites_only_known_articles("المادة ثلاثمائة وثمانية وستون تشترط التسجيل", &passages));
        assert!(!cites_only_known_articles("See Article 369 as well.", &passages));
    }

    #[tokio::test]
    async fn test_empty_retrieval_states_no_source() {
        let reply = responder("made up")
            .legal("what does Article 900 say?", &findings(vec![]), &CancellationToken::new())
            .await;
        assert_eq!(reply, no_source(false));
    }

    #[tokio::test]
    async fn test_unknown_citation_replaced_by_listing() {
        let reply = responder("Article 12 says otherwise.")
            .legal(
                "gift of real estate",
                &findings(vec![passage("Article 368", "A gift of real estate must be registered.")]),
                &CancellationToken::new(),
            )
            .await;
        assert!(reply.starts_with("These provisions are relevant"));
        assert!(reply.contains("Article 368 (Civil Code)"));
    }

    #[tokio::test]
    async fn test_grounded_answer_passes_through() {
        let reply = responder("Article 368 requires registration.")
            .legal(
                "gift of real estate",
                &findings(vec![passage("Article 368", "A gift of real estate must be registered.")]),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(reply, "Article 368 requires registration.");
    }

    #[tokio::test]
    async fn test_cancelled_direct_answer_apologizes() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reply = responder("hello").direct("مرحبا كيف الحال", &[], &cancel).await;
        assert_eq!(reply, apology(true));
    }
}
