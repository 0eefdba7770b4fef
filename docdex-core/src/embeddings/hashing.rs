//! Offline embeddings using feature hashing
//!
//! Each lowercase word is hashed to a fixed bucket and the term-frequency vector is
//! L2-normalized. The same text always produces the same vector, independent of
//! what else has been embedded, so it works without an inference service.
//!
//! Text without any alphanumeric word (emoji, punctuation runs) is hashed per
//! character instead. Only blank text embeds to the zero vector.

use super::{Embedder, Result};
use async_trait::async_trait;

/// Default dimensionality of hashed embeddings
pub const DEFAULT_DIM: usize = 512;

/// Deterministic bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            model_name: format!("feature-hashing-{dim}"),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token.bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
        (hash % self.dim as u64) as usize
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut tf = vec![0.0f32; self.dim];

        let mut words = 0;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            tf[self.bucket(&token.to_lowercase())] += 1.0;
            words += 1;
        }

        if words == 0 {
            let mut buf = [0u8; 4];
            for c in text.chars().filter(|c| !c.is_whitespace()) {
                tf[self.bucket(c.encode_utf8(&mut buf))] += 1.0;
            }
        }

        let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            tf.iter_mut().for_each(|x| *x /= norm);
        }

        tf
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}
