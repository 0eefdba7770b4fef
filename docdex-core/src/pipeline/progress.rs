//! Rebuild progress and reporting types

use serde::Serialize;
use std::fmt;

/// One progress event, emitted after each document finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildProgress {
    /// 0.0 to 100.0; the last event of a run is always exactly 100.0
    pub percent: f32,
    /// 1-based count of documents finished so far
    pub current: usize,
    pub total: usize,
    /// Title of the document that just finished (its ID if it could not be loaded)
    pub title: String,
}

impl RebuildProgress {
    pub(crate) fn new(current: usize, total: usize, title: String) -> Self {
        Self {
            percent: current as f32 / total.max(1) as f32 * 100.0,
            current,
            total,
            title,
        }
    }

    pub(crate) fn complete(total: usize, title: String) -> Self {
        Self {
            percent: 100.0,
            current: total,
            total,
            title,
        }
    }
}

/// Receives progress events during a rebuild
pub type ProgressCallback = Box<dyn Fn(&RebuildProgress) + Send + Sync>;

/// A document that could not be rebuilt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildFailure {
    pub doc_id: String,
    pub error: String,
}

impl fmt::Display for RebuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.doc_id, self.error)
    }
}

/// Result of a rebuild run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildReport {
    pub total_docs: usize,
    pub processed_docs: usize,
    pub success_docs: usize,
    pub failed_docs: usize,
    pub total_chunks: usize,
    pub errors: Vec<RebuildFailure>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(RebuildProgress::new(1, 4, "a".into()).percent, 25.0);
        assert_eq!(RebuildProgress::complete(3, "c".into()).percent, 100.0);
        assert_eq!(RebuildProgress::new(0, 0, String::new()).percent, 0.0);
    }

    #[test]
    fn test_failure_display() {
        let failure = RebuildFailure {
            doc_id: "doc-1".to_string(),
            error: "Embedding error: unreachable".to_string(),
        };
        assert_eq!(failure.to_string(), "doc-1: Embedding error: unreachable");
    }
}
