//! Knowledge Base Storage
//!
//! Statute chunks with their embeddings. The retriever only ever sees the
//! read-only [`KnowledgeSearch`] trait; ingestion goes through the concrete
//! [`KnowledgeStore`], which the startup indexer owns.

use rusqlite::params;
use serde::Serialize;

use super::database::Database;
use crate::utils::error::AppResult;

/// One stored chunk of a knowledge source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeChunk {
    pub id: i64,
    pub source_id: String,
    pub source_title: String,
    pub country: String,
    pub chunk_index: usize,
    pub header: String,
    pub content: String,
    /// Character offsets of the chunk in the source text
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// A chunk ready to be written.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: usize,
    pub header: String,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub embedding: Option<Vec<f32>>,
}

/// Identity of a knowledge source document.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    pub source_id: String,
    pub title: String,
    pub country: String,
}

/// Read-only access used by the legal branch.
pub trait KnowledgeSearch: Send + Sync {
    /// Every chunk available for scoring, optionally limited to a country.
    fn candidates(&self, country: Option<&str>) -> AppResult<Vec<KnowledgeChunk>>;

    /// Chunks of `source_id` within `radius` positions of `chunk_index`,
    /// including the chunk itself, in document order.
    fn adjacent(
        &self,
        source_id: &str,
        chunk_index: usize,
        radius: usize,
    ) -> AppResult<Vec<KnowledgeChunk>>;
}

/// SQLite-backed knowledge base.
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Database,
}

impl KnowledgeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Replace every chunk of a source in one transaction.
    pub fn replace_document(&self, source: &SourceMeta, chunks: &[NewChunk]) -> AppResult<usize> {
        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM kb_chunks WHERE source_id = ?1",
            params![source.source_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kb_chunks (source_id, source_title, country, chunk_index, header,
                     content, start_offset, end_offset, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    source.source_id,
                    source.title,
                    source.country.to_lowercase(),
                    chunk.chunk_index as i64,
                    chunk.header,
                    chunk.content,
                    chunk.start_offset as i64,
                    chunk.end_offset as i64,
                    chunk.embedding.as_deref().map(encode_embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    /// Total number of stored chunks.
    pub fn chunk_count(&self) -> AppResult<usize> {
        let conn = self.db.get_connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kb_chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

const CHUNK_COLUMNS: &str = "id, source_id, source_title, country, chunk_index, header, content,
     start_offset, end_offset, embedding";

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<KnowledgeChunk> {
    let blob: Option<Vec<u8>> = row.get(9)?;
    Ok(KnowledgeChunk {
        id: row.get(0)?,
        source_id: row.get(1)?,
        source_title: row.get(2)?,
        country: row.get(3)?,
        chunk_index: row.get::<_, i64>(4)? as usize,
        header: row.get(5)?,
        content: row.get(6)?,
        start_offset: row.get::<_, i64>(7)? as usize,
        end_offset: row.get::<_, i64>(8)? as usize,
        embedding: blob.as_deref().map(decode_embedding),
    })
}

impl KnowledgeSearch for KnowledgeStore {
    fn candidates(&self, country: Option<&str>) -> AppResult<Vec<KnowledgeChunk>> {
        let conn = self.db.get_connection()?;
        let chunks = match country.map(str::trim).filter(|c| !c.is_empty()) {
            Some(country) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM kb_chunks WHERE country = ?1 ORDER BY id",
                    CHUNK_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![country.to_lowercase()], row_to_chunk)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM kb_chunks ORDER BY id", CHUNK_COLUMNS))?;
                let rows = stmt
                    .query_map([], row_to_chunk)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(chunks)
    }

    fn adjacent(
        &self,
        source_id: &str,
        chunk_index: usize,
        radius: usize,
    ) -> AppResult<Vec<KnowledgeChunk>> {
        let conn = self.db.get_connection()?;
        let low = chunk_index.saturating_sub(radius) as i64;
        let high = (chunk_index + radius) as i64;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM kb_chunks
             WHERE source_id = ?1 AND chunk_index BETWEEN ?2 AND ?3
             ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![source_id, low, high], row_to_chunk)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Little-endian f32 bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
