//! Embeddings for semantic scoring of memory nodes.
//!
//! This module provides the [`Embedder`] trait and the two providers the
//! memory engine uses.
//!
//! # Implementations
//!
//! - [`LocalEmbedder`]: deterministic in-process feature hashing, no model files
//! - [`EmbeddingServiceClient`]: remote `/embed` service, falling back to the
//!   local embedder whenever the service cannot answer

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};

/// Embedding width used throughout the memory graph.
pub const DEFAULT_EMBEDDING_DIMS: usize = 384;

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Embedders convert text into dense vectors so that topics, details and
/// insights can be compared with [`cosine_similarity`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Local Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Weight of a whole-word feature relative to a character trigram.
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic local embedder.
///
/// Lower-cased word tokens and their character trigrams are hashed into
/// `dimensions` buckets and the result is L2-normalized. Texts that share
/// words or word fragments get a positive cosine similarity; identical texts
/// get identical vectors.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    /// Create a local embedder with the given width.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Compute the embedding synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[self.bucket(word.as_bytes())] += WORD_WEIGHT;

            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                vector[self.bucket(gram.as_bytes())] += TRIGRAM_WEIGHT;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn bucket(&self, feature: &[u8]) -> usize {
        (fnv1a(feature) % self.dimensions as u64) as usize
    }
}

impl Default for LocalEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMS)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// 64-bit FNV-1a; stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Service Client
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for a remote embedding service.
///
/// Talks to `POST {base}/embed` with `{"texts": [...]}` and expects
/// `{"vectors": [[...], ...]}` back. Any failure, including a response with
/// the wrong number of vectors, is logged and answered by the local embedder.
pub struct EmbeddingServiceClient {
    client: Client,
    base_url: String,
    fallback: LocalEmbedder,
}

impl EmbeddingServiceClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration, dimensions: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fallback: LocalEmbedder::new(dimensions),
        })
    }

    /// The service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service whether it is up.
    pub async fn health(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: HealthResponse = response.json().await?;
        Ok(body.status == "ok")
    }

    async fn embed_remote(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/embed", self.base_url))
            .json(&EmbedRequest { texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding service HTTP {}: {}",
                status, body
            )));
        }

        let body: EmbedResponse = response.json().await?;
        if body.vectors.len() != texts.len() {
            return Err(LlmError::Backend(format!(
                "Embedding service returned {} vectors for {} texts",
                body.vectors.len(),
                texts.len()
            )));
        }
        Ok(body.vectors)
    }
}

#[async_trait]
impl Embedder for EmbeddingServiceClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::Internal("empty embedding batch".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.embed_remote(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(e) => {
                tracing::warn!(
                    service = %self.base_url,
                    texts = texts.len(),
                    error = %e,
                    "Embedding service unavailable, using local embedder"
                );
                self.fallback.embed_batch(texts).await
            }
        }
    }

    fn dimensions(&self) -> usize {
        self.fallback.dimensions()
    }

    fn name(&self) -> &str {
        "service"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for building an embedder from application config.
///
/// Populated by the binary from the `[embedding]` config section. Keeps this
/// crate free of a dependency on sprig-config.
#[derive(Debug, Clone)]
pub struct EmbedderSpec {
    /// Remote embedding service; `None` or blank means local only.
    pub service_url: Option<String>,
    /// Embedding width.
    pub dimensions: usize,
    /// Timeout for service calls.
    pub timeout: Duration,
}

impl Default for EmbedderSpec {
    fn default() -> Self {
        Self {
            service_url: None,
            dimensions: DEFAULT_EMBEDDING_DIMS,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Build a `SharedEmbedder` from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    match spec
        .service_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        Some(url) => {
            tracing::debug!(service = %url, "Using embedding service");
            Ok(Arc::new(EmbeddingServiceClient::new(
                url,
                spec.timeout,
                spec.dimensions,
            )?))
        }
        None => Ok(Arc::new(LocalEmbedder::new(spec.dimensions))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate cosine similarity between two embeddings.
///
/// Empty, mismatched-length or zero-norm inputs score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_embedder_deterministic_and_normalized() {
        let embedder = LocalEmbedder::default();
        assert_eq!(embedder.dimensions(), 384);

        let a = embedder.embed("Unit test coverage").await.unwrap();
        let b = embedder.embed("unit TEST coverage").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_local_embedder_lexical_similarity() {
        let embedder = LocalEmbedder::default();
        let query = embedder.embed("unit test").await.unwrap();
        let related = embedder.embed("Unit test for storage").await.unwrap();
        let unrelated = embedder.embed("Booked a flight to Lisbon").await.unwrap();

        let close = cosine_similarity(&query, &related);
        let far = cosine_similarity(&query, &unrelated);
        assert!(close > 0.35, "expected related similarity, got {close}");
        assert!(close > far);
    }

    #[tokio::test]
    async fn test_local_embedder_empty_text_is_zero() {
        let embedder = LocalEmbedder::new(16);
        let v = embedder.embed("   ").await.unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let embedder = LocalEmbedder::default();
        let batch = embedder.embed_batch(&["coffee", "tea"]).await.unwrap();
        assert_eq!(batch[0], embedder.embed_sync("coffee"));
        assert_eq!(batch[1], embedder.embed_sync("tea"));
    }

    #[tokio::test]
    async fn test_service_client_falls_back_when_unreachable() {
        // Port 9 (discard) on loopback refuses connections.
        let client =
            EmbeddingServiceClient::new("http://127.0.0.1:9/", Duration::from_millis(200), 384)
                .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert!(client.health().await.is_err());

        let vectors = client.embed_batch(&["likes ramen"]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0], LocalEmbedder::new(384).embed_sync("likes ramen"));
    }

    #[test]
    fn test_build_embedder_selects_provider() {
        let local = build_embedder(&EmbedderSpec::default()).unwrap();
        assert_eq!(local.name(), "local");

        let blank = build_embedder(&EmbedderSpec {
            service_url: Some("  ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(blank.name(), "local");

        let service = build_embedder(&EmbedderSpec {
            service_url: Some("http://embeddings:8080".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(service.name(), "service");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
