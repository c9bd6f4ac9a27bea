//! Hybrid Retrieval
//!
//! Statute ingestion and ranked search over the knowledge base:
//! - `normalize` / `numerals` - Arabic normalization and spelled-out numbers
//! - `chunker` / `indexer` - article chunking and directory ingestion
//! - `embedding` - local hashing embedder and OpenAI-compatible endpoint
//! - `hybrid_search` - exact > semantic > lexical ranking with a quality gate
//! - `tools` - the legal partition's tools over the retriever

pub mod chunker;
pub mod embedding;
pub mod hybrid_search;
pub mod indexer;
pub mod normalize;
pub mod numerals;
pub mod tools;

pub use chunker::{chunk_document, DocumentChunk};
pub use embedding::{build_embedding_provider, EmbeddingProvider, HashingEmbedder};
pub use hybrid_search::{ContextWindow, HybridRetriever, Passage, RetrievalOutcome};
pub use indexer::{IndexReport, KnowledgeIndexer};
pub use numerals::{extract_citations, Citation};
pub use tools::{build_legal_toolset, ExpandContextTool, SearchKnowledgeTool};
