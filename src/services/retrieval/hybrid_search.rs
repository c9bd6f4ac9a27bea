//! Hybrid Retriever
//!
//! Ranks knowledge chunks by three signals in strict priority order:
//!
//! 1. exact match in the chunk header (article citation, or the whole query
//!    phrase when the query cites nothing)
//! 2. semantic similarity between the chunk embedding and `semantic_query`
//! 3. lexical overlap of stemmed content terms
//!
//! ```text
//! base      = 0.8 * semantic + 0.2 * lexical      (lexical alone without embeddings)
//! exact     = 0.75 + 0.25 * base                  in [0.75, 1.0]
//! non-exact = 0.74 * base                         in [0.0, 0.74]
//! ```
//!
//! so every exact match outranks every non-exact one. Passages under
//! `min_score` are dropped, never re-ranked.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use mini_moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::embedding::{cosine_similarity, EmbeddingProvider};
use super::normalize::{contains_phrase, content_terms, lexical_overlap, phrase_tokens, prepare_text};
use super::numerals::extract_citations;
use crate::models::settings::RetrievalSettings;
use crate::storage::knowledge::{KnowledgeChunk, KnowledgeSearch};
use crate::utils::error::{AppError, AppResult};

const SEMANTIC_WEIGHT: f32 = 0.8;
const LEXICAL_WEIGHT: f32 = 0.2;
const EXACT_FLOOR: f32 = 0.75;
const EXACT_SPAN: f32 = 0.25;
const NON_EXACT_CEILING: f32 = 0.74;
const SNIPPET_CHARS: usize = 700;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A ranked knowledge-base excerpt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub chunk_id: i64,
    pub source_id: String,
    pub source_title: String,
    pub country: String,
    pub header: String,
    pub snippet: String,
    /// Full chunk text handed to the panel and responder
    pub content: String,
    /// Composite score used for ranking and the quality gate
    pub similarity_score: f32,
    pub semantic_similarity: f32,
    pub lexical_overlap: f32,
    pub exact_phrase_match: bool,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Result of one search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub passages: Vec<Passage>,
    /// True when the query could not be embedded and ranking fell back to
    /// exact and lexical signals only
    pub semantic_degraded: bool,
    pub candidates_considered: usize,
}

/// Text around a passage, adjacent chunks included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    pub source_id: String,
    pub source_title: String,
    pub first_chunk: usize,
    pub last_chunk: usize,
    pub text: String,
}

/// Composite score for the three signals.
pub fn composite_score(exact: bool, semantic: Option<f32>, lexical: f32) -> f32 {
    let base = match semantic {
        Some(sem) => SEMANTIC_WEIGHT * sem + LEXICAL_WEIGHT * lexical,
        None => lexical,
    };
    if exact {
        EXACT_FLOOR + EXACT_SPAN * base
    } else {
        NON_EXACT_CEILING * base
    }
}

fn rank(a: &Passage, b: &Passage) -> Ordering {
    b.similarity_score
        .total_cmp(&a.similarity_score)
        .then_with(|| b.exact_phrase_match.cmp(&a.exact_phrase_match))
        .then_with(|| b.semantic_similarity.total_cmp(&a.semantic_similarity))
        .then_with(|| b.lexical_overlap.total_cmp(&a.lexical_overlap))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_CHARS {
        content.to_string()
    } else {
        let cut: String = content.chars().take(SNIPPET_CHARS).collect();
        format!("{}…", cut.trim_end())
    }
}

// ---------------------------------------------------------------------------
// HybridRetriever
// ---------------------------------------------------------------------------

pub struct HybridRetriever {
    knowledge: Arc<dyn KnowledgeSearch>,
    embedder: Arc<dyn EmbeddingProvider>,
    query_cache: Cache<String, Arc<Vec<f32>>>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        knowledge: Arc<dyn KnowledgeSearch>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: RetrievalSettings,
        cache_capacity: u64,
    ) -> Self {
        Self {
            knowledge,
            embedder,
            query_cache: Cache::new(cache_capacity.max(1)),
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    async fn embed_query(&self, prepared: &str) -> Option<Arc<Vec<f32>>> {
        let key = format!(
            "{}:{}:{}",
            self.embedder.name(),
            self.embedder.dimension(),
            prepared
        );
        if let Some(hit) = self.query_cache.get(&key) {
            return Some(hit);
        }
        match self.embedder.embed_query(prepared).await {
            Ok(vector) => {
                let vector = Arc::new(vector);
                self.query_cache.insert(key, vector.clone());
                Some(vector)
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed, ranking without semantic signal");
                None
            }
        }
    }

    /// Rank passages for a query.
    ///
    /// `query_text` drives exact header matching; `semantic_query` drives the
    /// embedding comparison; lexical terms come from both. `min_score`
    /// defaults to the configured quality gate.
    pub async fn search(
        &self,
        query_text: &str,
        semantic_query: &str,
        country: Option<&str>,
        min_score: Option<f32>,
    ) -> AppResult<RetrievalOutcome> {
        let min_score = min_score.unwrap_or(self.settings.min_score);
        let query_prepared = prepare_text(query_text);
        let semantic_prepared = prepare_text(semantic_query);
        let query_citations = extract_citations(&query_prepared);
        let query_phrase = phrase_tokens(&query_prepared);

        let mut query_terms = content_terms(&query_prepared);
        for term in content_terms(&semantic_prepared) {
            if !query_terms.contains(&term) {
                query_terms.push(term);
            }
        }

        let query_vector = if semantic_prepared.is_empty() {
            None
        } else {
            self.embed_query(&semantic_prepared).await
        };
        let semantic_degraded = query_vector.is_none();

        let knowledge = self.knowledge.clone();
        let country_owned = country.map(str::to_string);
        let candidates = tokio::task::spawn_blocking(move || {
            knowledge.candidates(country_owned.as_deref())
        })
        .await
        .map_err(|e| AppError::internal(format!("knowledge lookup task failed: {}", e)))??;

        let candidates_considered = candidates.len();
        let mut passages: Vec<Passage> = candidates
            .into_iter()
            .filter_map(|chunk| {
                let passage = self.score_chunk(
                    chunk,
                    &query_citations,
                    &query_phrase,
                    &query_terms,
                    query_vector.as_deref().map(Vec::as_slice),
                );
                (passage.similarity_score >= min_score).then_some(passage)
            })
            .collect();

        passages.sort_by(rank);
        passages.truncate(self.settings.max_results);

        for p in &passages {
            debug!(
                chunk_id = p.chunk_id,
                header = %p.header,
                score = p.similarity_score,
                semantic = p.semantic_similarity,
                lexical = p.lexical_overlap,
                exact = p.exact_phrase_match,
                "passage ranked"
            );
        }

        Ok(RetrievalOutcome {
            passages,
            semantic_degraded,
            candidates_considered,
        })
    }

    fn score_chunk(
        &self,
        chunk: KnowledgeChunk,
        query_citations: &[super::numerals::Citation],
        query_phrase: &[String],
        query_terms: &[String],
        query_vector: Option<&[f32]>,
    ) -> Passage {
        let header_prepared = prepare_text(&chunk.header);
        let exact = if query_citations.is_empty() {
            contains_phrase(&phrase_tokens(&header_prepared), query_phrase)
        } else {
            extract_citations(&header_prepared)
                .iter()
                .any(|c| query_citations.contains(c))
        };

        let doc_terms: HashSet<String> = content_terms(&header_prepared)
            .into_iter()
            .chain(content_terms(&prepare_text(&chunk.content)))
            .collect();
        let lexical = lexical_overlap(query_terms, &doc_terms);

        let semantic = match (query_vector, chunk.embedding.as_deref()) {
            (Some(q), Some(c)) => Some(cosine_similarity(q, c)),
            _ => None,
        };
        let score = composite_score(exact, semantic, lexical);

        Passage {
            chunk_id: chunk.id,
            snippet: snippet(&chunk.content),
            source_id: chunk.source_id,
            source_title: chunk.source_title,
            country: chunk.country,
            header: chunk.header,
            content: chunk.content,
            similarity_score: score,
            semantic_similarity: semantic.unwrap_or(0.0),
            lexical_overlap: lexical,
            exact_phrase_match: exact,
            chunk_index: chunk.chunk_index,
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
        }
    }

    /// Fetch the chunks around a passage so the answer is not cut mid-article.
    pub async fn expand_context(
        &self,
        source_id: &str,
        chunk_index: usize,
        radius: Option<usize>,
    ) -> AppResult<ContextWindow> {
        let radius = radius.unwrap_or(self.settings.context_radius);
        let knowledge = self.knowledge.clone();
        let source = source_id.to_string();
        let chunks = tokio::task::spawn_blocking(move || {
            knowledge.adjacent(&source, chunk_index, radius)
        })
        .await
        .map_err(|e| AppError::internal(format!("knowledge lookup task failed: {}", e)))??;

        let (Some(first), Some(last)) = (chunks.first(), chunks.last()) else {
            return Err(AppError::not_found(format!(
                "chunk {} of source {}",
                chunk_index, source_id
            )));
        };

        Ok(ContextWindow {
            source_id: first.source_id.clone(),
            source_title: first.source_title.clone(),
            first_chunk: first.chunk_index,
            last_chunk: last.chunk_index,
            text: chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
    }
}
