//! Embedding Providers
//!
//! `EmbeddingProvider` is kept apart from `LlmProvider`: chunks are embedded
//! once at index time and queries once per turn. Two backends:
//!
//! - `HashingEmbedder` - local feature hashing over stemmed terms and
//!   character trigrams. Deterministic and offline, the default.
//! - `OpenAIEmbeddingProvider` - any OpenAI-compatible `/embeddings`
//!   endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::normalize::{content_terms, prepare_text};
use crate::models::settings::{EmbeddingBackend, EmbeddingSettings};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingError {
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    #[error("network error: {message}")]
    NetworkError { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("server error ({status:?}): {message}")]
    ServerError { message: String, status: Option<u16> },

    #[error("invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl EmbeddingError {
    /// Whether this error is transient and the operation could be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::NetworkError { .. }
                | EmbeddingError::ServerError { .. }
                | EmbeddingError::ProviderUnavailable { .. }
        )
    }
}

/// Convenience alias for embedding operation results.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier, part of the query cache key.
    fn name(&self) -> &str;

    /// Embed a batch of document texts; one vector per input.
    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, query: &str) -> EmbeddingResult<Vec<f32>> {
        let results = self.embed_documents(&[query]).await?;
        results.into_iter().next().ok_or_else(|| EmbeddingError::Other {
            message: "embed_documents returned empty results for single query".to_string(),
        })
    }

    /// Vector dimensionality.
    fn dimension(&self) -> usize;

    /// Whether this provider runs without network calls.
    fn is_local(&self) -> bool;
}

/// Cosine similarity clamped to `[0, 1]`. Mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Hashing embedder
// ---------------------------------------------------------------------------

/// Feature-hashing embedder over stemmed content terms (weight 1) and their
/// character trigrams (weight 0.5), L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(16),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in content_terms(&prepare_text(text)) {
            self.add_feature(&mut vector, &term, 1.0);
            let chars: Vec<char> = term.chars().collect();
            if chars.len() > 3 {
                for window in chars.windows(3) {
                    let gram: String = window.iter().collect();
                    self.add_feature(&mut vector, &format!("#{}", gram), 0.5);
                }
            }
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(documents.iter().map(|d| self.embed(d)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn is_local(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible embeddings
// ---------------------------------------------------------------------------

const DEFAULT_EMBEDDINGS_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    dimension: usize,
}

impl OpenAIEmbeddingProvider {
    pub fn new(settings: &EmbeddingSettings) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::InvalidConfig {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        let base = settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDINGS_BASE_URL)
            .trim_end_matches('/');
        Ok(Self {
            client,
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone(),
            endpoint: format!("{}/embeddings", base),
            dimension: settings.dimensions,
        })
    }

    fn map_http_error(status: u16, body: &str) -> EmbeddingError {
        match status {
            401 | 403 => EmbeddingError::AuthenticationFailed {
                message: body.to_string(),
            },
            400..=499 => EmbeddingError::InvalidConfig {
                message: format!("HTTP {}: {}", status, body),
            },
            _ => EmbeddingError::ServerError {
                message: body.to_string(),
                status: Some(status),
            },
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, documents: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(vec![]);
        }

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input: documents,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                EmbeddingError::ProviderUnavailable {
                    message: format!("cannot connect to {}: {}", self.endpoint, e),
                }
            } else {
                EmbeddingError::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::NetworkError {
                message: format!("failed to read response body: {}", e),
            })?;
        if status != 200 {
            return Err(Self::map_http_error(status, &body));
        }

        let mut parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| EmbeddingError::ParseError {
                message: format!("failed to parse embedding response: {}", e),
            })?;
        if parsed.data.len() != documents.len() {
            return Err(EmbeddingError::ParseError {
                message: format!(
                    "expected {} embeddings, got {}",
                    documents.len(),
                    parsed.data.len()
                ),
            });
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_local(&self) -> bool {
        false
    }
}

/// Build the configured embedding backend.
pub fn build_embedding_provider(
    settings: &EmbeddingSettings,
) -> EmbeddingResult<std::sync::Arc<dyn EmbeddingProvider>> {
    Ok(match settings.backend {
        EmbeddingBackend::Hashing => std::sync::Arc::new(HashingEmbedder::new(settings.dimensions)),
        EmbeddingBackend::OpenAI => std::sync::Arc::new(OpenAIEmbeddingProvider::new(settings)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_bounds() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(128);
        let a = embedder.embed("هبة العقار وتوثيقها");
        let b = embedder.embed("هبة العقار وتوثيقها");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hashing_embedder_related_texts_score_higher() {
        let embedder = HashingEmbedder::new(256);
        let query = embedder.embed("هبة العقار توثيق");
        let related = embedder.embed("تنعقد هبة العقار بورقة رسمية ويجب توثيقها");
        let unrelated = embedder.embed("employment contract termination notice");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(32);
        assert!(embedder.embed("في من على").iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_embed_query_uses_documents() {
        let embedder = HashingEmbedder::new(64);
        let q = embedder.embed_query("article 368").await.unwrap();
        assert_eq!(q.len(), 64);
        assert_eq!(q, embedder.embed("article 368"));
    }

    #[tokio::test]
    async fn test_openai_provider_unreachable_is_unavailable() {
        let settings = EmbeddingSettings {
            backend: EmbeddingBackend::OpenAI,
            base_url: Some("http://127.0.0.1:9".to_string()),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let provider = OpenAIEmbeddingProvider::new(&settings).unwrap();
        let err = provider.embed_query("x").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
