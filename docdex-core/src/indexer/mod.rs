//! Document CRUD with embedding-lifecycle consistency
//!
//! The indexer owns the path from document text to stored chunks: chunk the
//! content, embed every chunk, then hand the whole generation to storage in one
//! write. Nothing is written until every embedding call has succeeded, so a
//! failure leaves the previous generation (or no document at all) in place.

pub mod locks;

pub use locks::KeyedLocks;

use crate::documents::{Chunk, Document, DocumentUpdate, NewDocument};
use crate::embeddings::{estimate_tokens, Embedder, EmbeddingError, TextChunker};
use crate::storage::{IndexStorage, StorageError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use ulid::Ulid;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Document already exists: {0}")]
    DuplicateDocument(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}

impl IndexError {
    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Embedding(e) if e.is_retryable())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Writes documents and keeps their chunk generations in step with content
pub struct Indexer {
    store: Arc<dyn IndexStorage>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    locks: Arc<KeyedLocks>,
}

impl Indexer {
    pub fn new(store: Arc<dyn IndexStorage>, embedder: Arc<dyn Embedder>, chunker: TextChunker) -> Self {
        Self::with_locks(store, embedder, chunker, Arc::new(KeyedLocks::new()))
    }

    /// Share a lock table with other indexers over the same store
    pub fn with_locks(
        store: Arc<dyn IndexStorage>,
        embedder: Arc<dyn Embedder>,
        chunker: TextChunker,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            locks,
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexStorage> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Add a new document, generating its ID when none is given
    pub async fn add(&self, new_doc: NewDocument) -> Result<Document> {
        let doc_id = match new_doc.doc_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_doc_id(&new_doc.library),
        };

        let _guard = self.locks.lock(&doc_id).await;

        if self.store.get_document(&doc_id)?.is_some() {
            return Err(IndexError::DuplicateDocument(doc_id));
        }

        let now = Utc::now();
        let doc = Document {
            doc_id,
            title: new_doc.title,
            content: new_doc.content,
            library: new_doc.library,
            category: new_doc.category,
            summary: new_doc.summary,
            created_at: now,
            updated_at: now,
        };

        let chunks = self.embed_chunks(&doc).await?;
        self.store.write_generation(&doc, &chunks)?;

        info!(doc_id = %doc.doc_id, chunks = chunks.len(), "Added document");
        Ok(doc)
    }

    pub fn get(&self, doc_id: &str) -> Result<Option<Document>> {
        Ok(self.store.get_document(doc_id)?)
    }

    /// Apply `update` to a document. Returns false when `doc_id` is unknown.
    ///
    /// Only a content change regenerates chunks; any other field is written
    /// without touching the stored chunks or calling the embedder.
    pub async fn update(&self, doc_id: &str, update: DocumentUpdate) -> Result<bool> {
        let _guard = self.locks.lock(doc_id).await;

        let Some(mut doc) = self.store.get_document(doc_id)? else {
            return Ok(false);
        };

        let reembed = update.requires_reembedding(&doc);
        update.apply_to(&mut doc, Utc::now());

        if reembed {
            let chunks = self.embed_chunks(&doc).await?;
            self.store.write_generation(&doc, &chunks)?;
            info!(doc_id, chunks = chunks.len(), "Updated document content");
        } else {
            self.store.save_document_metadata(&doc)?;
            info!(doc_id, "Updated document metadata");
        }

        Ok(true)
    }

    /// Delete a document and its chunks. Returns false when `doc_id` is unknown.
    pub async fn delete(&self, doc_id: &str) -> Result<bool> {
        let _guard = self.locks.lock(doc_id).await;
        let deleted = self.store.delete_document(doc_id)?;
        if deleted {
            info!(doc_id, "Deleted document");
        }
        Ok(deleted)
    }

    /// Recompute the chunk generation of a stored document from its current content.
    /// Returns the number of chunks written.
    pub async fn reindex(&self, doc_id: &str) -> Result<(Document, usize)> {
        let _guard = self.locks.lock(doc_id).await;

        let doc = self
            .store
            .get_document(doc_id)?
            .ok_or_else(|| IndexError::NotFound(doc_id.to_string()))?;

        let chunks = self.embed_chunks(&doc).await?;
        self.store.write_generation(&doc, &chunks)?;

        debug!(doc_id, chunks = chunks.len(), "Reindexed document");
        Ok((doc, chunks.len()))
    }

    /// Chunk and embed a document's content. Empty content yields no chunks.
    async fn embed_chunks(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let texts = self.chunker.chunk_text(&doc.content);
        let total_chunks = texts.len() as u32;
        let model = self.embedder.model_name().to_string();

        debug!(doc_id = %doc.doc_id, chunks = texts.len(), model = %model, "Embedding chunks");

        let mut chunks = Vec::with_capacity(texts.len());
        for (index, text) in texts.into_iter().enumerate() {
            let embedding = self.embedder.embed(&text).await?;
            chunks.push(Chunk {
                doc_id: doc.doc_id.clone(),
                chunk_index: index as u32,
                chunk_tokens: estimate_tokens(&text) as u32,
                chunk_text: text,
                embedding,
                embedding_model: model.clone(),
                total_chunks,
            });
        }

        Ok(chunks)
    }
}

/// `{library-slug}_{ulid}`, e.g. `data-science_01J...`
fn generate_doc_id(library: &str) -> String {
    let slug = library
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "doc".to_string() } else { slug };
    format!("{}_{}", slug, Ulid::new())
}
