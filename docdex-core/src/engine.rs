//! Engine facade
//!
//! One explicitly constructed instance owns the store, the indexer and the
//! retriever. Callers pass it around instead of reaching for shared global state,
//! and configuration changes go through [`Engine::reconfigure`].

use crate::config::{ConfigError, EngineConfig};
use crate::documents::{Chunk, Document, DocumentUpdate, NewDocument};
use crate::embeddings::{self, ChunkerError, Embedder, EmbeddingError, TextChunker};
use crate::indexer::{IndexError, Indexer, KeyedLocks};
use crate::pipeline::{ProgressCallback, RebuildReport, Reindexer};
use crate::retrieval::{Retriever, RetrieverError, SearchMode, SearchResult};
use crate::storage::{IndexStorage, SqliteStore, StorageError, StoreStats};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Retrieval(#[from] RetrieverError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Document indexing and hybrid retrieval over one store
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn IndexStorage>,
    locks: Arc<KeyedLocks>,
    indexer: Arc<Indexer>,
    retriever: Retriever,
}

impl Engine {
    /// Open the SQLite store under `config.data_dir` and build the configured embedder
    pub fn open(config: EngineConfig) -> Result<Self> {
        let path = config.database_path();
        let store = SqliteStore::open(&path)?;
        info!(path = %path.display(), "Opened document store");
        Self::with_store(config, Arc::new(store))
    }

    /// Use an existing store with the embedder selected by `config`
    pub fn with_store(config: EngineConfig, store: Arc<dyn IndexStorage>) -> Result<Self> {
        let embedder = embeddings::from_config(&config.embedding)?;
        Self::with_components(config, store, embedder)
    }

    /// Assemble an engine from explicit parts
    pub fn with_components(
        config: EngineConfig,
        store: Arc<dyn IndexStorage>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let locks = Arc::new(KeyedLocks::new());
        let (indexer, retriever) = Self::assemble(&config, &store, embedder, &locks)?;
        Ok(Self {
            config,
            store,
            locks,
            indexer,
            retriever,
        })
    }

    fn assemble(
        config: &EngineConfig,
        store: &Arc<dyn IndexStorage>,
        embedder: Arc<dyn Embedder>,
        locks: &Arc<KeyedLocks>,
    ) -> Result<(Arc<Indexer>, Retriever)> {
        let chunker = TextChunker::new(config.chunking.clone())?;
        let indexer = Arc::new(Indexer::with_locks(
            Arc::clone(store),
            Arc::clone(&embedder),
            chunker,
            Arc::clone(locks),
        ));
        let retriever = Retriever::new(Arc::clone(store), embedder, config.retrieval.clone());
        Ok((indexer, retriever))
    }

    /// Swap in a new embedder, chunker and retrieval settings.
    ///
    /// The store stays open; `data_dir` only takes effect on the next [`Engine::open`].
    /// Existing chunks keep their old `embedding_model` until [`Engine::rebuild`] runs.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<()> {
        let embedder = embeddings::from_config(&config.embedding)?;
        self.reconfigure_with(config, embedder)
    }

    /// [`Engine::reconfigure`] with an explicit embedder
    pub fn reconfigure_with(&mut self, config: EngineConfig, embedder: Arc<dyn Embedder>) -> Result<()> {
        let (indexer, retriever) = Self::assemble(&config, &self.store, embedder, &self.locks)?;
        info!(model = indexer.embedder().model_name(), "Reconfigured engine");
        self.indexer = indexer;
        self.retriever = retriever;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn add_document(&self, doc: NewDocument) -> Result<Document> {
        Ok(self.indexer.add(doc).await?)
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        Ok(self.indexer.get(doc_id)?)
    }

    /// Returns false when `doc_id` is unknown
    pub async fn update_document(&self, doc_id: &str, update: DocumentUpdate) -> Result<bool> {
        Ok(self.indexer.update(doc_id, update).await?)
    }

    /// Returns false when `doc_id` is unknown
    pub async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        Ok(self.indexer.delete(doc_id).await?)
    }

    pub fn list_documents(&self, library: Option<&str>) -> Result<Vec<Document>> {
        Ok(self.store.list_documents(library)?)
    }

    pub fn get_chunks(&self, doc_id: &str) -> Result<Vec<Chunk>> {
        Ok(self.store.get_chunks(doc_id)?)
    }

    pub async fn query(
        &self,
        text: &str,
        mode: SearchMode,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.retriever.search(text, mode, top_k).await?)
    }

    /// Recompute chunks and embeddings for `doc_ids`, or all documents
    pub async fn rebuild(
        &self,
        doc_ids: Option<Vec<String>>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<RebuildReport> {
        let reindexer = Reindexer::new(Arc::clone(&self.indexer), self.config.rebuild.workers);
        Ok(reindexer.rebuild(doc_ids, on_progress).await?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingProvider;
    use crate::test_support::failing_on;
    use tempfile::tempdir;

    fn hashing_config(data_dir: &std::path::Path, dimension: usize) -> EngineConfig {
        let mut config = EngineConfig::new(data_dir);
        config.embedding.provider = EmbeddingProvider::Hashing;
        config.embedding.dimension = Some(dimension);
        config
    }

    #[tokio::test]
    async fn test_engine_round_trip_persists() {
        let dir = tempdir().unwrap();

        {
            let engine = Engine::open(hashing_config(dir.path(), 64)).unwrap();
            engine
                .add_document(NewDocument::new("t-test", "The t-test compares two means.", "stats").with_id("ttest"))
                .await
                .unwrap();
        }

        let engine = Engine::open(hashing_config(dir.path(), 64)).unwrap();
        let doc = engine.get_document("ttest").unwrap().unwrap();
        assert_eq!(doc.title, "t-test");
        assert_eq!(engine.get_chunks("ttest").unwrap().len(), 1);

        let results = engine.query("means", SearchMode::Hybrid, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "ttest");
    }

    #[tokio::test]
    async fn test_engine_crud_surface() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(hashing_config(dir.path(), 64)).unwrap();

        let doc = engine
            .add_document(NewDocument::new("Charts", "Bar charts show counts.", "viz"))
            .await
            .unwrap();
        engine
            .add_document(NewDocument::new("Means", "The mean is an average.", "stats"))
            .await
            .unwrap();

        assert_eq!(engine.list_documents(None).unwrap().len(), 2);
        assert_eq!(engine.list_documents(Some("viz")).unwrap()[0].doc_id, doc.doc_id);

        assert!(engine
            .update_document(&doc.doc_id, DocumentUpdate::title("Bar charts"))
            .await
            .unwrap());
        assert!(engine.delete_document(&doc.doc_id).await.unwrap());
        assert!(!engine.delete_document(&doc.doc_id).await.unwrap());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.embedding_models, vec!["feature-hashing-64"]);
    }

    #[tokio::test]
    async fn test_reconfigure_then_rebuild_switches_model() {
        let dir = tempdir().unwrap();
        let mut engine = Engine::open(hashing_config(dir.path(), 64)).unwrap();
        for (id, content) in [("a", "Sampling draws units."), ("b", "Power analysis sizes studies.")] {
            engine
                .add_document(NewDocument::new(id, content, "stats").with_id(id))
                .await
                .unwrap();
        }

        engine.reconfigure(hashing_config(dir.path(), 128)).unwrap();

        // Old chunks are invisible to the new model's vector path until rebuilt
        assert!(engine.query("sampling", SearchMode::Vector, None).await.unwrap().is_empty());
        assert_eq!(
            engine.query("sampling", SearchMode::Keyword, None).await.unwrap().len(),
            1
        );

        let report = engine.rebuild(None, None).await.unwrap();
        assert_eq!(report.success_docs, 2);
        assert_eq!(engine.stats().unwrap().embedding_models, vec!["feature-hashing-128"]);
        assert_eq!(engine.query("sampling", SearchMode::Vector, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_add_surfaces_index_error() {
        let store: Arc<dyn IndexStorage> = Arc::new(SqliteStore::in_memory().unwrap());
        let engine =
            Engine::with_components(EngineConfig::default(), store, failing_on("FAIL")).unwrap();

        let result = engine
            .add_document(NewDocument::new("Broken", "FAIL here", "stats"))
            .await;

        assert!(matches!(
            result,
            Err(EngineError::Index(IndexError::Embedding(_)))
        ));
        assert!(engine.list_documents(None).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_chunking_config() {
        let store: Arc<dyn IndexStorage> = Arc::new(SqliteStore::in_memory().unwrap());
        let mut config = EngineConfig::default();
        config.chunking.overlap_tokens = config.chunking.max_tokens;

        assert!(matches!(
            Engine::with_components(config, store, failing_on("x")),
            Err(EngineError::Chunker(_))
        ));
    }
}
