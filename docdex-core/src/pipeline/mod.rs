//! Batch reindexing
//!
//! Recomputes chunk generations for many documents, e.g. after an embedding model
//! change. Documents run concurrently up to the worker limit; a failing document is
//! recorded in the report and never stops the batch.

pub mod progress;

pub use progress::{ProgressCallback, RebuildFailure, RebuildProgress, RebuildReport};

use crate::indexer::{Indexer, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Drives [`Indexer::reindex`] over a set of documents
pub struct Reindexer {
    indexer: Arc<Indexer>,
    workers: usize,
}

impl Reindexer {
    pub fn new(indexer: Arc<Indexer>, workers: usize) -> Self {
        Self {
            indexer,
            workers: workers.max(1),
        }
    }

    /// Rebuild `doc_ids`, or every stored document when `None`.
    ///
    /// `on_progress` fires once per document; the last call reports 100%.
    pub async fn rebuild(
        &self,
        doc_ids: Option<Vec<String>>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<RebuildReport> {
        let ids = match doc_ids {
            Some(ids) => dedup_preserving_order(ids),
            None => self.indexer.store().document_ids()?,
        };

        let total = ids.len();
        let mut report = RebuildReport {
            total_docs: total,
            ..Default::default()
        };
        if total == 0 {
            return Ok(report);
        }

        info!(total, workers = self.workers, "Starting rebuild");

        let indexer = &self.indexer;
        let mut outcomes = stream::iter(ids)
            .map(|doc_id| async move {
                let outcome = indexer.reindex(&doc_id).await;
                (doc_id, outcome)
            })
            .buffer_unordered(self.workers);

        let mut last_title = None;
        while let Some((doc_id, outcome)) = outcomes.next().await {
            report.processed_docs += 1;

            let title = match outcome {
                Ok((doc, chunks)) => {
                    report.success_docs += 1;
                    report.total_chunks += chunks;
                    doc.title
                }
                Err(e) => {
                    warn!(doc_id = %doc_id, error = %e, "Failed to rebuild document");
                    report.failed_docs += 1;
                    report.errors.push(RebuildFailure {
                        doc_id: doc_id.clone(),
                        error: e.to_string(),
                    });
                    doc_id
                }
            };

            if report.processed_docs < total {
                if let Some(callback) = on_progress {
                    callback(&RebuildProgress::new(report.processed_docs, total, title));
                }
            } else {
                last_title = Some(title);
            }
        }

        // The final event is emitted here so it always reads exactly 100%
        if let (Some(callback), Some(title)) = (on_progress, last_title) {
            callback(&RebuildProgress::complete(total, title));
        }

        info!(
            success = report.success_docs,
            failed = report.failed_docs,
            chunks = report.total_chunks,
            "Rebuild finished"
        );
        Ok(report)
    }
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
