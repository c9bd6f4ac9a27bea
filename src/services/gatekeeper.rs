//! Gatekeeper
//!
//! Deterministic pre-filter that answers greetings, thanks, short
//! acknowledgments and farewells without a reasoning call. Rules match the
//! whole normalized message, never a substring, and anything longer than a
//! few words passes straight through to the router. Missing a trivial
//! message costs one reasoning call; fast-pathing a real request would lose
//! it, so the rule set stays small.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::retrieval::normalize::{has_arabic, normalize_text};

const MAX_TOKENS: usize = 4;
const MAX_CHARS: usize = 40;

/// Which rule fast-pathed a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FastRule {
    Greeting,
    Thanks,
    Acknowledgment,
    Farewell,
}

impl FastRule {
    fn reply(&self, arabic: bool) -> &'static str {
        match (self, arabic) {
            (FastRule::Greeting, true) => {
                "أهلاً بك! كيف يمكنني مساعدتك اليوم؟ يمكنك سؤالي عن نص قانوني أو طلب تعديل على سجلات المكتب."
            }
            (FastRule::Greeting, false) => {
                "Hello! How can I help today? You can ask about a statute or ask me to update the office records."
            }
            (FastRule::Thanks, true) => "العفو، سعيد بالمساعدة.",
            (FastRule::Thanks, false) => "You're welcome, glad to help.",
            (FastRule::Acknowledgment, true) => "حسناً. أخبرني إن احتجت شيئاً آخر.",
            (FastRule::Acknowledgment, false) => "Alright. Let me know if you need anything else.",
            (FastRule::Farewell, true) => "مع السلامة، في أمان الله.",
            (FastRule::Farewell, false) => "Goodbye, talk soon.",
        }
    }
}

/// A canned reply produced without any reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FastResult {
    pub reply: String,
    pub rule: FastRule,
}

struct CompiledRule {
    rule: FastRule,
    regex: Regex,
}

/// Phrases are written in normalized form (see `normalize_text`).
fn rule_phrases() -> Vec<(FastRule, &'static [&'static str])> {
    vec![
        (
            FastRule::Greeting,
            &[
                "مرحبا",
                "مرحبا بك",
                "اهلا",
                "اهلا وسهلا",
                "اهلين",
                "هلا",
                "السلام عليكم",
                "السلام عليكم ورحمه الله",
                "سلام",
                "صباح الخير",
                "مساء الخير",
                "hi",
                "hello",
                "hey",
                "hi there",
                "hello there",
                "good morning",
                "good afternoon",
                "good evening",
                "salam",
            ],
        ),
        (
            FastRule::Thanks,
            &[
                "شكرا",
                "شكرا جزيلا",
                "شكرا لك",
                "مشكور",
                "الف شكر",
                "thanks",
                "thank you",
                "thanks a lot",
                "thank you very much",
                "thx",
            ],
        ),
        (
            FastRule::Acknowledgment,
            &["تمام", "حسنا", "طيب", "ماشي", "ok", "okay", "got it"],
        ),
        (
            FastRule::Farewell,
            &[
                "مع السلامه",
                "الي اللقاء",
                "وداعا",
                "bye",
                "goodbye",
                "see you",
                "bye bye",
            ],
        ),
    ]
}

/// Compiled rules, initialized once.
fn rules() -> &'static Vec<CompiledRule> {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        rule_phrases()
            .into_iter()
            .filter_map(|(rule, phrases)| {
                let alternatives = phrases
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>()
                    .join("|");
                // A phrase may repeat ("hi hi", "شكرا شكرا") but nothing else may follow
                let pattern = format!("^(?:{alt})(?: (?:{alt}))*$", alt = alternatives);
                Regex::new(&pattern).ok().map(|regex| CompiledRule { rule, regex })
            })
            .collect()
    })
}

/// Classify a message without a reasoning call.
///
/// Returns `None` for anything the rules do not fully match; the router
/// then handles the message.
pub fn classify_fast(text: &str) -> Option<FastResult> {
    let normalized = normalize_text(text);
    if normalized.is_empty()
        || normalized.chars().count() > MAX_CHARS
        || normalized.split(' ').count() > MAX_TOKENS
    {
        return None;
    }

    let rule = rules()
        .iter()
        .find(|r| r.regex.is_match(&normalized))?
        .rule;
    Some(FastResult {
        reply: rule.reply(has_arabic(text)).to_string(),
        rule,
    })
}
