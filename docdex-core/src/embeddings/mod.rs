//! Embeddings module for semantic search
//!
//! Provides text chunking and embedding generation through an external
//! inference service, plus an offline feature-hashing embedder.

pub mod chunker;
pub mod hashing;
pub mod http;

pub use chunker::{estimate_tokens, ChunkerConfig, ChunkerError, TextChunker, TOKEN_MARGIN};
pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding service unreachable: {0}")]
    Unreachable(String),

    #[error("Embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed embedding response: {0}")]
    Malformed(String),
}

impl EmbeddingError {
    /// Whether a caller-side retry could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Unreachable(_) => true,
            EmbeddingError::Status { status, .. } => *status == 429 || *status >= 500,
            EmbeddingError::Malformed(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Trait for embedding backends (allows mocking)
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name recorded on every chunk produced with this embedder
    fn model_name(&self) -> &str;

    /// Generate the embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedder selected by `config`
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config.clone())?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.dimension.unwrap_or(hashing::DEFAULT_DIM),
        ))),
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
