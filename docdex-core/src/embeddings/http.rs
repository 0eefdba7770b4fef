//! HTTP embedding client
//!
//! Calls an external inference endpoint with `{ model, input }` and expects
//! `{ embedding: [f32] }` back. No retries happen here.

use super::{Embedder, EmbeddingError, Result};
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding client backed by a remote inference service
pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Unreachable(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn validate(&self, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(EmbeddingError::Malformed("empty embedding".to_string()));
        }
        if let Some(expected) = self.config.dimension {
            if embedding.len() != expected {
                return Err(EmbeddingError::Malformed(format!(
                    "embedding has dimension {}, expected {}",
                    embedding.len(),
                    expected
                )));
            }
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::Malformed(
                "embedding contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = truncate_chars(text, self.config.max_input_chars);
        if input.len() < text.len() {
            tracing::debug!(
                original_chars = text.chars().count(),
                max_chars = self.config.max_input_chars,
                "truncating embedding input"
            );
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: truncate_chars(&body, 500).to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Unreachable(e.to_string()))?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::Malformed(format!("{}: {}", e, truncate_chars(&body, 200))))?;

        self.validate(&parsed.embedding)?;
        Ok(parsed.embedding)
    }
}
