//! Statute Chunker
//!
//! Splits a statute into one chunk per article. A line is an article
//! heading when its first word is an article marker (المادة, مادة,
//! Article, Art) followed by a number in digits or words. Documents with no
//! headings fall back to paragraph windows.

use super::normalize::{light_stem, prepare_text};
use super::numerals::extract_citations;

/// Target size of a paragraph window, in characters.
const WINDOW_CHARS: usize = 1200;
/// Headers are cut to this many characters.
const MAX_HEADER_CHARS: usize = 160;

/// One chunk of a source document. Offsets are character positions.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub index: usize,
    pub header: String,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn lines_with_offsets(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let len = raw.chars().count();
        lines.push(Line {
            text: raw.trim_end_matches(['\n', '\r']),
            start: offset,
            end: offset + len,
        });
        offset += len;
    }
    lines
}

/// Whether a line opens a new article.
pub fn is_article_heading(line: &str) -> bool {
    let prepared = prepare_text(line);
    let mut tokens = prepared.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    let marker = matches!(light_stem(first), "ماده" | "article" | "art");
    if !marker {
        return false;
    }
    // Only the marker and its number, not a citation later in the sentence
    let head: Vec<&str> = prepared.split_whitespace().take(2).collect();
    !extract_citations(&head.join(" ")).is_empty()
}

fn truncate_chars(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}…", cut.trim_end())
    }
}

fn build_chunk(index: usize, header: String, lines: &[Line<'_>]) -> Option<DocumentChunk> {
    let content = lines
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    if content.is_empty() {
        return None;
    }
    Some(DocumentChunk {
        index,
        header,
        content,
        start_offset: lines.first().map(|l| l.start).unwrap_or(0),
        end_offset: lines.last().map(|l| l.end).unwrap_or(0),
    })
}

/// Split `text` into article chunks, or paragraph windows when it has no
/// article headings. Chunk indexes are dense and start at 0.
pub fn chunk_document(title: &str, text: &str) -> Vec<DocumentChunk> {
    let lines = lines_with_offsets(text);
    let heading_rows: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_article_heading(l.text))
        .map(|(i, _)| i)
        .collect();

    if heading_rows.is_empty() {
        return paragraph_windows(title, &lines);
    }

    let mut chunks = Vec::new();
    // Preamble before the first article
    if let Some(chunk) = build_chunk(
        chunks.len(),
        truncate_chars(title, MAX_HEADER_CHARS),
        &lines[..heading_rows[0]],
    ) {
        chunks.push(chunk);
    }
    for (n, &row) in heading_rows.iter().enumerate() {
        let end = heading_rows.get(n + 1).copied().unwrap_or(lines.len());
        let header = truncate_chars(lines[row].text, MAX_HEADER_CHARS);
        if let Some(chunk) = build_chunk(chunks.len(), header, &lines[row..end]) {
            chunks.push(chunk);
        }
    }
    chunks
}

fn paragraph_windows(title: &str, lines: &[Line<'_>]) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut window_start = 0;
    let mut window_chars = 0;

    for (i, line) in lines.iter().enumerate() {
        window_chars += line.text.chars().count();
        let paragraph_break = line.text.trim().is_empty();
        if paragraph_break && window_chars >= WINDOW_CHARS {
            push_window(&mut chunks, title, &lines[window_start..=i]);
            window_start = i + 1;
            window_chars = 0;
        }
    }
    if window_start < lines.len() {
        push_window(&mut chunks, title, &lines[window_start..]);
    }
    chunks
}

fn push_window(chunks: &mut Vec<DocumentChunk>, title: &str, lines: &[Line<'_>]) {
    let first_line = lines
        .iter()
        .map(|l| l.text.trim())
        .find(|t| !t.is_empty())
        .unwrap_or(title);
    let header = truncate_chars(first_line, MAX_HEADER_CHARS);
    if let Some(chunk) = build_chunk(chunks.len(), header, lines) {
        chunks.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CIVIL_CODE: &str = "القانون المدني\nأحكام عامة\n\
المادة 367\nالهبة عقد يتصرف بمقتضاه الواهب في مال له دون عوض.\n\
المادة ثلاثمائة وثمانية وستون\nتكون هبة العقار بورقة رسمية ويجب توثيقها.\n\
Article 369\nGift revocation rules; see المادة 367 above.\n";

    #[test]
    fn test_heading_detection() {
        assert!(is_article_heading("المادة 368"));
        assert!(is_article_heading("مادة (٣٦٨) - الهبة"));
        assert!(is_article_heading("المادة ثلاثمائة وثمانية وستون"));
        assert!(is_article_heading("Article 12: Scope"));
        assert!(!is_article_heading("وفقا لأحكام المادة 368 من هذا القانون"));
        assert!(!is_article_heading("المادة السابقة تنص على"));
    }

    #[test]
    fn test_chunks_per_article_with_preamble() {
        let chunks = chunk_document("Civil Code", CIVIL_CODE);
        let headers: Vec<&str> = chunks.iter().map(|c| c.header.as_str()).collect();
        assert_eq!(
            headers,
            vec![
                "Civil Code",
                "المادة 367",
                "المادة ثلاثمائة وثمانية وستون",
                "Article 369"
            ]
        );
        assert!(chunks[2].content.contains("توثيقها"));
        let indexes: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_offsets_point_into_source() {
        let chunks = chunk_document("Civil Code", CIVIL_CODE);
        let chars: Vec<char> = CIVIL_CODE.chars().collect();
        for chunk in &chunks {
            let slice: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
            assert_eq!(slice.trim(), chunk.content);
        }
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "First paragraph about leases.\n\nSecond paragraph about deposits.\n";
        let chunks = chunk_document("Lease guide", text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].header, "First paragraph about leases.");
        assert!(chunk_document("empty", "  \n\n").is_empty());
    }
}
