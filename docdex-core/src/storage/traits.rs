//! Storage trait abstractions
//!
//! The indexer and retriever only see these traits, so a different durable backend
//! can replace SQLite without touching them.

use crate::documents::{Chunk, Document};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, super::StorageError>;

/// Trait for storing and retrieving documents
pub trait DocumentStorage: Send + Sync {
    /// Get a document by ID
    fn get_document(&self, doc_id: &str) -> Result<Option<Document>>;

    /// List documents in insertion order, optionally restricted to one library
    fn list_documents(&self, library: Option<&str>) -> Result<Vec<Document>>;

    /// All document IDs in insertion order
    fn document_ids(&self) -> Result<Vec<String>>;

    /// Overwrite the metadata of an existing document, leaving its chunks alone.
    /// Returns false when the document does not exist.
    fn save_document_metadata(&self, doc: &Document) -> Result<bool>;

    /// Delete a document and all of its chunks. Returns false when it does not exist.
    fn delete_document(&self, doc_id: &str) -> Result<bool>;
}

/// Trait for storing and scanning chunks
pub trait ChunkStorage: Send + Sync {
    /// Upsert `doc` and replace its whole chunk set with `chunks` in one step
    fn write_generation(&self, doc: &Document, chunks: &[Chunk]) -> Result<()>;

    /// Chunks of one document ordered by `chunk_index`
    fn get_chunks(&self, doc_id: &str) -> Result<Vec<Chunk>>;

    /// Every chunk produced by `embedding_model`, in document insertion order
    fn scan_vectors(&self, embedding_model: &str) -> Result<Vec<ChunkVector>>;

    /// Chunks matching any term of `query`, best first
    fn keyword_search(&self, query: &str) -> Result<Vec<KeywordHit>>;

    /// [`ChunkStorage::scan_vectors`] and [`ChunkStorage::keyword_search`] read from
    /// one consistent state, so both see the same generation of every document
    fn hybrid_snapshot(
        &self,
        embedding_model: &str,
        query: &str,
    ) -> Result<(Vec<ChunkVector>, Vec<KeywordHit>)>;

    /// Total number of stored chunks
    fn count_chunks(&self) -> Result<usize>;
}

/// Everything the engine needs from a backend
pub trait IndexStorage: DocumentStorage + ChunkStorage {
    fn stats(&self) -> Result<StoreStats>;
}

/// Embedding of one chunk, as read by the vector path
#[derive(Debug, Clone)]
pub struct ChunkVector {
    pub doc_id: String,
    pub chunk_index: u32,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

/// Keyword match on one chunk. Higher `score` is better.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub doc_id: String,
    pub chunk_index: u32,
    pub chunk_text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    /// Distinct embedding models present in the chunk table
    pub embedding_models: Vec<String>,
}
