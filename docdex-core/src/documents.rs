//! Document and chunk records
//!
//! Documents are the source of truth; chunks are derived from their content and
//! never edited directly by callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub content: String,
    pub library: String,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for adding a document. `doc_id` is generated when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    pub doc_id: Option<String>,
    pub title: String,
    pub content: String,
    pub library: String,
    pub category: Option<String>,
    pub summary: Option<String>,
}

impl NewDocument {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        library: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            library: library.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, doc_id: impl Into<String>) -> Self {
        self.doc_id = Some(doc_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update of a document. `None` leaves a field as it is.
///
/// The optional fields nest: `Some(None)` clears `category` or `summary`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub library: Option<String>,
    pub category: Option<Option<String>>,
    pub summary: Option<Option<String>>,
}

impl DocumentUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Whether applying this update to `current` invalidates its chunks and embeddings.
    ///
    /// Only a change of `content` does; title, library, category and summary are
    /// metadata and leave the stored chunks untouched.
    pub fn requires_reembedding(&self, current: &Document) -> bool {
        self.content
            .as_deref()
            .is_some_and(|content| content != current.content)
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.library.is_none()
            && self.category.is_none()
            && self.summary.is_none()
    }

    /// Apply the present fields to `doc` and bump `updated_at`
    pub fn apply_to(self, doc: &mut Document, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(content) = self.content {
            doc.content = content;
        }
        if let Some(library) = self.library {
            doc.library = library;
        }
        if let Some(category) = self.category {
            doc.category = category;
        }
        if let Some(summary) = self.summary {
            doc.summary = summary;
        }
        doc.updated_at = now;
    }
}

/// A derived, embedded slice of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    /// 0-based, contiguous within a document
    pub chunk_index: u32,
    pub chunk_text: String,
    pub chunk_tokens: u32,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    /// Chunk count of the document when this chunk was created
    pub total_chunks: u32,
}
