//! Text Normalization
//!
//! Arabic-aware normalization shared by indexing, scoring and the hashing
//! embedder. Both sides of every comparison go through the same functions,
//! so a query and a stored chunk always agree on spelling variants.

use std::collections::HashSet;
use std::sync::OnceLock;

use super::numerals::words_to_digits;

/// Normalize orthography: strip diacritics and tatweel, unify alef forms,
/// map `ى→ي`, `ة→ه`, `ؤ→و`, `ئ→ي`, Arabic-Indic digits to ASCII,
/// punctuation to spaces, lowercase Latin, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            // harakat, superscript alef, tatweel
            '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}' => {}
            'أ' | 'إ' | 'آ' | 'ٱ' => out.push('ا'),
            'ى' => out.push('ي'),
            'ة' => out.push('ه'),
            'ؤ' => out.push('و'),
            'ئ' => out.push('ي'),
            '٠'..='٩' => out.push(digit_from(ch, '٠')),
            '۰'..='۹' => out.push(digit_from(ch, '۰')),
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn digit_from(ch: char, zero: char) -> char {
    let offset = ch as u32 - zero as u32;
    char::from_digit(offset, 10).unwrap_or('0')
}

/// Normalized text with spelled-out numbers rewritten as digits.
pub fn prepare_text(text: &str) -> String {
    words_to_digits(&normalize_text(text))
}

/// Strip the definite article and attached prepositions from an Arabic
/// token. Latin tokens and digits are returned unchanged.
pub fn light_stem(token: &str) -> &str {
    const PREFIXES: &[&str] = &["وال", "بال", "كال", "فال", "لل", "ال"];
    for prefix in PREFIXES {
        if let Some(rest) = token.strip_prefix(prefix) {
            if rest.chars().count() >= 2 {
                return rest;
            }
        }
    }
    token
}

fn stopwords() -> &'static HashSet<String> {
    static STOPWORDS: OnceLock<HashSet<String>> = OnceLock::new();
    STOPWORDS.get_or_init(|| {
        const RAW: &[&str] = &[
            // Arabic
            "في", "من", "على", "إلى", "عن", "ما", "ماذا", "هل", "هو", "هي", "أن", "إن", "أو",
            "مع", "هذا", "هذه", "التي", "الذي", "الذين", "ذلك", "تلك", "كان", "كانت", "قد",
            "لا", "لم", "لن", "ثم", "أي", "كل", "بعد", "قبل", "عند", "بين", "حول", "حسب",
            "بشأن", "حكم", "يا", "نعم", "لو", "كيف", "متى", "أين", "لماذا", "و", "ف", "ب",
            // English
            "the", "a", "an", "of", "in", "on", "to", "is", "are", "was", "were", "what",
            "which", "for", "and", "or", "with", "about", "by", "be", "does", "do", "how",
            "when", "under", "me", "my", "please", "tell", "can", "you", "it", "this", "that",
        ];
        RAW.iter().map(|w| normalize_text(w)).collect()
    })
}

/// Whether a normalized token carries no retrieval signal.
pub fn is_stopword(token: &str) -> bool {
    stopwords().contains(token)
}

/// Stemmed content terms of already-prepared text, in order.
pub fn content_terms(prepared: &str) -> Vec<String> {
    prepared
        .split_whitespace()
        .filter(|t| !is_stopword(t))
        .map(light_stem)
        .filter(|t| t.chars().count() >= 2 || t.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// Stemmed tokens of already-prepared text, stopwords kept. Used for
/// phrase matching where word order matters.
pub fn phrase_tokens(prepared: &str) -> Vec<String> {
    prepared
        .split_whitespace()
        .map(|t| light_stem(t).to_string())
        .collect()
}

/// Fraction of distinct query terms that also occur in the document.
pub fn lexical_overlap(query_terms: &[String], doc_terms: &HashSet<String>) -> f32 {
    let distinct: HashSet<&String> = query_terms.iter().collect();
    if distinct.is_empty() {
        return 0.0;
    }
    let hits = distinct.iter().filter(|t| doc_terms.contains(**t)).count();
    hits as f32 / distinct.len() as f32
}

/// Whether `needle` occurs as a contiguous run inside `haystack`.
pub fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Whether the text contains any Arabic letter.
pub fn has_arabic(text: &str) -> bool {
    text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c))
}
