//! Spelled-Out Numbers and Citations
//!
//! Statutes cite articles both as digits ("المادة 368") and in words
//! ("المادة ثلاثمائة وثمانية وستون"). Both indexing and querying rewrite
//! number words to digits on normalized text, so either form finds the
//! other.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::normalize::{has_arabic, normalize_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberWord {
    /// 1-9 and additive values (10, 20..90, 200..900, 2000)
    Value(u64),
    /// Arabic "احد"/"احدى": only a number when followed by عشر
    One,
    /// مائة / hundred: multiplies a preceding unit
    Hundred,
    /// ألف / آلاف / thousand: multiplies everything before it
    Thousand,
}

fn lexicon() -> &'static HashMap<String, NumberWord> {
    static LEXICON: OnceLock<HashMap<String, NumberWord>> = OnceLock::new();
    LEXICON.get_or_init(|| {
        use NumberWord::*;
        let raw: &[(&str, NumberWord)] = &[
            ("واحد", Value(1)),
            ("واحدة", Value(1)),
            ("أحد", One),
            ("إحدى", One),
            ("اثنان", Value(2)),
            ("اثنين", Value(2)),
            ("اثنا", Value(2)),
            ("اثني", Value(2)),
            ("ثلاث", Value(3)),
            ("ثلاثة", Value(3)),
            ("أربع", Value(4)),
            ("أربعة", Value(4)),
            ("خمس", Value(5)),
            ("خمسة", Value(5)),
            ("ست", Value(6)),
            ("ستة", Value(6)),
            ("سبع", Value(7)),
            ("سبعة", Value(7)),
            ("ثمان", Value(8)),
            ("ثماني", Value(8)),
            ("ثمانية", Value(8)),
            ("تسع", Value(9)),
            ("تسعة", Value(9)),
            ("عشر", Value(10)),
            ("عشرة", Value(10)),
            ("عشرون", Value(20)),
            ("عشرين", Value(20)),
            ("ثلاثون", Value(30)),
            ("ثلاثين", Value(30)),
            ("أربعون", Value(40)),
            ("أربعين", Value(40)),
            ("خمسون", Value(50)),
            ("خمسين", Value(50)),
            ("ستون", Value(60)),
            ("ستين", Value(60)),
            ("سبعون", Value(70)),
            ("سبعين", Value(70)),
            ("ثمانون", Value(80)),
            ("ثمانين", Value(80)),
            ("تسعون", Value(90)),
            ("تسعين", Value(90)),
            ("مائة", Hundred),
            ("مئة", Hundred),
            ("مائتان", Value(200)),
            ("مائتين", Value(200)),
            ("مئتان", Value(200)),
            ("مئتين", Value(200)),
            ("ألف", Thousand),
            ("آلاف", Thousand),
            ("ألفان", Value(2000)),
            ("ألفين", Value(2000)),
            // English
            ("one", Value(1)),
            ("two", Value(2)),
            ("three", Value(3)),
            ("four", Value(4)),
            ("five", Value(5)),
            ("six", Value(6)),
            ("seven", Value(7)),
            ("eight", Value(8)),
            ("nine", Value(9)),
            ("ten", Value(10)),
            ("eleven", Value(11)),
            ("twelve", Value(12)),
            ("thirteen", Value(13)),
            ("fourteen", Value(14)),
            ("fifteen", Value(15)),
            ("sixteen", Value(16)),
            ("seventeen", Value(17)),
            ("eighteen", Value(18)),
            ("nineteen", Value(19)),
            ("twenty", Value(20)),
            ("thirty", Value(30)),
            ("forty", Value(40)),
            ("fifty", Value(50)),
            ("sixty", Value(60)),
            ("seventy", Value(70)),
            ("eighty", Value(80)),
            ("ninety", Value(90)),
            ("hundred", Hundred),
            ("thousand", Thousand),
        ];

        let mut map: HashMap<String, NumberWord> = raw
            .iter()
            .map(|(word, value)| (normalize_text(word), *value))
            .collect();

        // Fused hundreds: ثلاثمائة, ثلاثمئة, ... تسعمائة
        let units: &[(&str, u64)] = &[
            ("ثلاث", 3),
            ("أربع", 4),
            ("خمس", 5),
            ("ست", 6),
            ("سبع", 7),
            ("ثمان", 8),
            ("تسع", 9),
        ];
        for (unit, n) in units {
            for hundred in ["مائة", "مئة"] {
                map.insert(normalize_text(&format!("{}{}", unit, hundred)), Value(n * 100));
            }
        }
        map
    })
}

fn lookup(token: &str) -> Option<NumberWord> {
    lexicon().get(token).copied()
}

/// Classify a token that may carry the Arabic "و" connector.
fn classify(token: &str) -> Option<NumberWord> {
    lookup(token).or_else(|| {
        token
            .strip_prefix('و')
            .filter(|rest| !rest.is_empty())
            .and_then(lookup)
    })
}

fn is_ten(word: Option<NumberWord>) -> bool {
    word == Some(NumberWord::Value(10))
}

#[derive(Default)]
struct Accumulator {
    total: u64,
    current: u64,
    last_unit: Option<u64>,
    words: usize,
}

impl Accumulator {
    fn push(&mut self, word: NumberWord) {
        self.words += 1;
        match word {
            NumberWord::Value(n) => {
                self.current += n;
                self.last_unit = (1..=9).contains(&n).then_some(n);
            }
            NumberWord::One => {
                self.current += 1;
                self.last_unit = Some(1);
            }
            NumberWord::Hundred => {
                match self.last_unit.take() {
                    // ثلاث مائة, three hundred
                    Some(unit) => self.current += unit * 99,
                    None => self.current += 100,
                }
            }
            NumberWord::Thousand => {
                let multiplied = if self.current == 0 { 1000 } else { self.current * 1000 };
                self.total += multiplied;
                self.current = 0;
                self.last_unit = None;
            }
        }
    }

    fn value(&self) -> u64 {
        self.total + self.current
    }
}

/// Rewrite runs of number words in normalized text as digits.
///
/// "الماده ثلاثمايه وثمانيه وستون" becomes "الماده 368" and
/// "article three hundred sixty eight" becomes "article 368". Input must
/// already be normalized with [`normalize_text`].
pub fn words_to_digits(normalized: &str) -> String {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let mut acc = Accumulator::default();
        let mut j = i;
        while j < tokens.len() {
            let token = tokens[j];
            let next = tokens.get(j + 1).map(|t| classify(t));
            match classify(token) {
                Some(NumberWord::One) if !next.map(is_ten).unwrap_or(false) => break,
                Some(word) => {
                    acc.push(word);
                    j += 1;
                }
                // "and" only joins two number words
                None if token == "and"
                    && acc.words > 0
                    && next.flatten().is_some() =>
                {
                    j += 1;
                }
                None => break,
            }
        }

        if acc.words > 0 {
            out.push(acc.value().to_string());
            i = j;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}

/// A legal citation found in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "number", rename_all = "snake_case")]
pub enum Citation {
    Article(u32),
}

impl Citation {
    /// Canonical header form in the language of the surrounding text.
    pub fn canonical(&self, arabic: bool) -> String {
        match self {
            Citation::Article(n) if arabic => format!("المادة {}", n),
            Citation::Article(n) => format!("Article {}", n),
        }
    }
}

fn citation_regex() -> Option<&'static Regex> {
    static CITATION: OnceLock<Option<Regex>> = OnceLock::new();
    CITATION
        .get_or_init(|| {
            // normalized forms: الماده, ماده, والماده, بالماده, للماده
            Regex::new(r"(?:^|\s)(?:[وبلف]?(?:ال|ل)?ماده|article|art)\s+(\d{1,5})(?:\s|$)").ok()
        })
        .as_ref()
}

/// Article citations in prepared text (normalized, numbers as digits), in
/// order of appearance and without duplicates.
pub fn extract_citations(prepared: &str) -> Vec<Citation> {
    let mut seen = Vec::new();
    let Some(regex) = citation_regex() else {
        return seen;
    };
    // Pad so adjacent citations can share the separating space
    let padded = prepared.replace(' ', "  ");
    for caps in regex.captures_iter(&padded) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            let citation = Citation::Article(n);
            if !seen.contains(&citation) {
                seen.push(citation);
            }
        }
    }
    seen
}

/// Canonical query text for the citations in `original`, or `None` when it
/// cites nothing.
pub fn canonical_citation_query(original: &str, citations: &[Citation]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }
    let arabic = has_arabic(original);
    Some(
        citations
            .iter()
            .map(|c| c.canonical(arabic))
            .collect::<Vec<_>>()
            .join(" "),
    )
}
