//! Knowledge Indexer
//!
//! Loads the statute corpus into the knowledge store. Layout:
//! `<knowledge_dir>/<country>/<file>.txt|.md`; files directly under the
//! root belong to the `general` country. Re-indexing a file replaces its
//! chunks.

use std::path::Path;
use std::sync::Arc;

use ignore::WalkBuilder;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::chunker::chunk_document;
use super::embedding::EmbeddingProvider;
use crate::storage::knowledge::{KnowledgeStore, NewChunk, SourceMeta};
use crate::utils::error::AppResult;

/// Country assigned to files at the top of the knowledge directory.
pub const GENERAL_COUNTRY: &str = "general";

const EMBED_BATCH: usize = 32;

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub sources: usize,
    pub chunks: usize,
    /// Files that could not be read
    pub skipped: usize,
    /// Sources stored without embeddings after an embedding failure
    pub unembedded: usize,
}

pub struct KnowledgeIndexer {
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl KnowledgeIndexer {
    pub fn new(store: KnowledgeStore, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Index every `.txt`/`.md` file under `dir`.
    pub async fn index_directory(&self, dir: &Path) -> AppResult<IndexReport> {
        let mut report = IndexReport::default();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "knowledge directory does not exist, nothing indexed");
            return Ok(report);
        }

        let mut builder = WalkBuilder::new(dir);
        builder.hidden(true).follow_links(false).git_ignore(true);

        let mut files = Vec::new();
        for entry in builder.build() {
            let Ok(entry) = entry else {
                continue;
            };
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "txt" | "md"))
                .unwrap_or(false);
            if path.is_file() && is_text {
                files.push(path.to_path_buf());
            }
        }
        // Walk order is not guaranteed
        files.sort();

        for path in files {
            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let rel_norm = rel.to_string_lossy().replace('\\', "/");
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %rel_norm, error = %e, "skipping unreadable knowledge file");
                    report.skipped += 1;
                    continue;
                }
            };

            let country = if rel.components().count() > 1 {
                rel.components()
                    .next()
                    .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
                    .unwrap_or_else(|| GENERAL_COUNTRY.to_string())
            } else {
                GENERAL_COUNTRY.to_string()
            };
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
                .unwrap_or_else(|| rel_norm.clone());

            let source = SourceMeta {
                source_id: source_id_for(&rel_norm),
                title,
                country,
            };
            let (chunks, embedded) = self.index_document(&source, &text).await?;
            report.sources += 1;
            report.chunks += chunks;
            if !embedded {
                report.unembedded += 1;
            }
        }

        info!(
            dir = %dir.display(),
            sources = report.sources,
            chunks = report.chunks,
            skipped = report.skipped,
            "knowledge directory indexed"
        );
        Ok(report)
    }

    /// Chunk, embed and store one document. Returns the chunk count and
    /// whether embeddings were stored.
    pub async fn index_document(&self, source: &SourceMeta, text: &str) -> AppResult<(usize, bool)> {
        let chunks = chunk_document(&source.title, text);
        let inputs: Vec<String> = chunks
            .iter()
            .map(|c| format!("{}\n{}", c.header, c.content))
            .collect();

        let mut embeddings: Option<Vec<Vec<f32>>> = Some(Vec::with_capacity(inputs.len()));
        for batch in inputs.chunks(EMBED_BATCH) {
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            match self.embedder.embed_documents(&refs).await {
                Ok(vectors) => {
                    if let Some(all) = embeddings.as_mut() {
                        all.extend(vectors);
                    }
                }
                Err(e) => {
                    warn!(
                        source = %source.source_id,
                        error = %e,
                        "embedding failed, storing chunks for lexical search only"
                    );
                    embeddings = None;
                    break;
                }
            }
        }

        let embedded = embeddings.is_some();
        let mut vectors = embeddings.unwrap_or_default().into_iter();
        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .map(|c| NewChunk {
                chunk_index: c.index,
                header: c.header,
                content: c.content,
                start_offset: c.start_offset,
                end_offset: c.end_offset,
                embedding: vectors.next(),
            })
            .collect();

        let store = self.store.clone();
        let source_owned = source.clone();
        let stored = tokio::task::spawn_blocking(move || store.replace_document(&source_owned, &rows))
            .await
            .map_err(|e| crate::utils::error::AppError::internal(format!("indexing task failed: {}", e)))??;

        debug!(source = %source.source_id, title = %source.title, chunks = stored, "source indexed");
        Ok((stored, embedded))
    }
}

/// Stable source id: hex SHA-256 of the path relative to the knowledge root.
pub fn source_id_for(relative_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relative_path.as_bytes());
    format!("{:x}", hasher.finalize())
}
