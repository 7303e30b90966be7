//! Embedding collaborators
//!
//! The `Embedder` trait abstracts text-to-vector generation. Two
//! implementations exist: a deterministic hash-based embedder for tests and
//! offline operation, and an HTTP client for an OpenAI-compatible endpoint.
//! Which one runs is decided at composition time, never inside retrieval.

use async_trait::async_trait;
use thiserror::Error;

mod http;

pub use http::HttpEmbedder;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding request failed: {0}")]
    RequestError(String),

    #[error("Embedding request timed out")]
    Timeout,

    #[error("Embedding endpoint returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbedError {
    /// Whether the failure is transient and worth retrying at the boundary
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbedError::Timeout | EmbedError::RequestError(_) => true,
            EmbedError::ApiError { status, .. } => *status == 429 || *status >= 500,
            EmbedError::InvalidInput(_) | EmbedError::DimensionMismatch { .. } => false,
        }
    }
}

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn name(&self) -> &str;
}

/// Deterministic hash-based embedder
///
/// Expands a BLAKE3 hash of the input into a unit-length vector of the
/// configured dimension. Carries no semantic signal; identical texts always
/// map to identical vectors, which is what the tests and offline mode need.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::InvalidInput("Empty text".to_string()));
        }

        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dimension];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .into_iter()
            .map(|b| (f32::from(b) / 128.0) - 1.0)
            .collect();

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash-embedder"
    }
}
