pub mod config;
pub mod documents;
pub mod embeddings;
pub mod engine;
pub mod indexer;
pub mod pipeline;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use config::{EmbeddingProvider, EngineConfig};
pub use documents::{Chunk, Document, DocumentUpdate, NewDocument};
pub use engine::{Engine, EngineError};
pub use pipeline::{ProgressCallback, RebuildProgress, RebuildReport};
pub use retrieval::{SearchMode, SearchResult};
pub use storage::{SqliteStore, StoreStats};
