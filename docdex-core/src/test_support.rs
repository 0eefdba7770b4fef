//! Embedders shared by unit tests

use crate::embeddings::{Embedder, EmbeddingError, HashingEmbedder, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hashing embedder that counts how often it is called
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(64),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        "counting-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.embed_text(text))
    }
}

/// Hashing embedder that sleeps on every call and records the peak number of calls
/// in flight at once
pub struct SlowEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: HashingEmbedder::new(64),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_name(&self) -> &str {
        "slow-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.inner.embed_text(text))
    }
}

/// Fails with a 503 for any text containing `marker`
pub struct FailingEmbedder {
    inner: HashingEmbedder,
    marker: &'static str,
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains(self.marker) {
            return Err(EmbeddingError::Status {
                status: 503,
                body: "simulated outage".to_string(),
            });
        }
        Ok(self.inner.embed_text(text))
    }
}

pub fn failing_on(marker: &'static str) -> Arc<dyn Embedder> {
    Arc::new(FailingEmbedder {
        inner: HashingEmbedder::new(64),
        marker,
    })
}

/// Maps marker words to fixed 2-d directions so similarity scores are known exactly:
/// `alpha` -> [1, 0], `beta` -> [0, 1], `gamma` -> [0.6, 0.8], anything else -> [0.5, 0.5]
pub struct AxisEmbedder;

#[async_trait]
impl Embedder for AxisEmbedder {
    fn model_name(&self) -> &str {
        "axis-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = if text.contains("alpha") {
            vec![1.0, 0.0]
        } else if text.contains("beta") {
            vec![0.0, 1.0]
        } else if text.contains("gamma") {
            vec![0.6, 0.8]
        } else {
            vec![0.5, 0.5]
        };
        Ok(vector)
    }
}
