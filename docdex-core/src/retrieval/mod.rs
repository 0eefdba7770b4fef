//! Hybrid retrieval over indexed documents
//!
//! Two independent rankings feed the result:
//! - vector: embed the query once, score every chunk by cosine similarity and keep
//!   each document's best chunk
//! - keyword: BM25 over chunk text, pooled the same way
//!
//! Hybrid mode fuses both full rankings with RRF and only then cuts to Top-K. Both
//! rankings are read from one store snapshot, so a concurrent rewrite of a document
//! shows up in neither or in both.

pub mod fusion;

pub use fusion::{max_pool, reciprocal_rank_fusion, ChunkScore, DocScore};

use crate::config::RetrievalConfig;
use crate::embeddings::{cosine_similarity, Embedder, EmbeddingError};
use crate::storage::{ChunkVector, IndexStorage, KeywordHit, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Which rankings a query uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Keyword,
    #[default]
    Hybrid,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchMode::Vector => "vector",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vector" => Ok(SearchMode::Vector),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode '{}', expected vector, keyword or hybrid",
                other
            )),
        }
    }
}

/// A ranked document with the chunk that matched best
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub doc_id: String,
    pub title: String,
    pub library: String,
    pub category: Option<String>,
    pub score: f32,
    pub chunk_index: u32,
    pub snippet: String,
}

/// Read-only query side of the engine
pub struct Retriever {
    store: Arc<dyn IndexStorage>,
    embedder: Arc<dyn Embedder>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn IndexStorage>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Rank documents for `query`. `top_k` defaults to the configured value.
    ///
    /// Blank queries and an empty index return no results.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        if query.trim().is_empty() || top_k == 0 {
            return Ok(vec![]);
        }
        if self.store.count_chunks()? == 0 {
            debug!("No indexed chunks, skipping query");
            return Ok(vec![]);
        }

        let ranked = match mode {
            SearchMode::Vector => self.vector_ranking(query).await?,
            SearchMode::Keyword => self.keyword_ranking(query)?,
            SearchMode::Hybrid => {
                let (vector, keyword) = self.hybrid_rankings(query).await?;
                debug!(
                    vector = vector.len(),
                    keyword = keyword.len(),
                    "Fusing rankings"
                );
                reciprocal_rank_fusion(&[vector.as_slice(), keyword.as_slice()], self.config.rrf_k)
            }
        };

        self.hydrate(ranked, top_k)
    }

    /// Documents ordered by their best chunk's cosine similarity to the query
    pub async fn vector_ranking(&self, query: &str) -> Result<Vec<DocScore>> {
        let query_embedding = self.embedder.embed(query).await?;
        let vectors = self.store.scan_vectors(self.embedder.model_name())?;
        Ok(rank_vectors(&query_embedding, vectors))
    }

    /// Documents ordered by their best chunk's BM25 score
    pub fn keyword_ranking(&self, query: &str) -> Result<Vec<DocScore>> {
        Ok(rank_hits(self.store.keyword_search(query)?))
    }

    /// Vector and keyword rankings over the same chunk generations.
    ///
    /// The query is embedded before the store is read.
    pub async fn hybrid_rankings(&self, query: &str) -> Result<(Vec<DocScore>, Vec<DocScore>)> {
        let query_embedding = self.embedder.embed(query).await?;
        let (vectors, hits) = self
            .store
            .hybrid_snapshot(self.embedder.model_name(), query)?;
        Ok((rank_vectors(&query_embedding, vectors), rank_hits(hits)))
    }

    /// Attach document metadata to the first `top_k` ranked entries.
    /// Documents deleted since ranking are skipped.
    fn hydrate(&self, ranked: Vec<DocScore>, top_k: usize) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(top_k.min(ranked.len()));

        for entry in ranked {
            if results.len() == top_k {
                break;
            }
            let Some(doc) = self.store.get_document(&entry.doc_id)? else {
                continue;
            };
            results.push(SearchResult {
                doc_id: entry.doc_id,
                title: doc.title,
                library: doc.library,
                category: doc.category,
                score: entry.score,
                chunk_index: entry.chunk_index,
                snippet: entry.snippet,
            });
        }

        Ok(results)
    }
}

fn rank_vectors(query_embedding: &[f32], vectors: Vec<ChunkVector>) -> Vec<DocScore> {
    max_pool(vectors.into_iter().map(|v| ChunkScore {
        score: cosine_similarity(query_embedding, &v.embedding),
        doc_id: v.doc_id,
        chunk_index: v.chunk_index,
        chunk_text: v.chunk_text,
    }))
}

fn rank_hits(hits: Vec<KeywordHit>) -> Vec<DocScore> {
    max_pool(hits.into_iter().map(|h| ChunkScore {
        doc_id: h.doc_id,
        chunk_index: h.chunk_index,
        chunk_text: h.chunk_text,
        score: h.score,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Chunk, Document, NewDocument};
    use crate::embeddings::{ChunkerConfig, HashingEmbedder, TextChunker};
    use crate::indexer::Indexer;
    use crate::storage::{self, ChunkStorage, DocumentStorage, SqliteStore, StoreStats};
    use crate::test_support::{failing_on, AxisEmbedder, CountingEmbedder};

    fn setup(embedder: Arc<dyn Embedder>, chunking: ChunkerConfig) -> (Indexer, Retriever) {
        let store: Arc<dyn IndexStorage> = Arc::new(SqliteStore::in_memory().unwrap());
        let indexer = Indexer::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            TextChunker::new(chunking).unwrap(),
        );
        let retriever = Retriever::new(store, embedder, RetrievalConfig::default());
        (indexer, retriever)
    }

    async fn add(indexer: &Indexer, id: &str, title: &str, content: &str) {
        indexer
            .add(NewDocument::new(title, content, "stats").with_id(id))
            .await
            .unwrap();
    }

    fn assert_sorted(results: &[SearchResult]) {
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score, "results not sorted");
        }
    }

    #[tokio::test]
    async fn test_hybrid_example_scenario() {
        let (indexer, retriever) = setup(Arc::new(HashingEmbedder::default()), ChunkerConfig::default());
        add(
            &indexer,
            "ttest",
            "t-test",
            "The t-test is a statistical hypothesis test comparing the means of two groups.",
        )
        .await;
        add(
            &indexer,
            "ml",
            "Machine learning",
            "Machine learning builds predictive models from training data.",
        )
        .await;
        add(
            &indexer,
            "viz",
            "Visualization",
            "Data visualization presents charts and graphs to reveal patterns.",
        )
        .await;

        let results = retriever
            .search("hypothesis testing", SearchMode::Hybrid, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].doc_id, "ttest");
        assert_eq!(results[0].title, "t-test");
        assert!(results[0].snippet.contains("hypothesis"));
        assert_sorted(&results);
    }

    #[tokio::test]
    async fn test_vector_max_pooling() {
        let (indexer, retriever) = setup(Arc::new(AxisEmbedder), ChunkerConfig::with_tokens(10, 0));

        // One perfect chunk among many orthogonal ones
        let mixed = [
            "alpha sits alone in this paragraph",
            "beta fills this other paragraph",
            "beta fills yet another paragraph",
            "beta keeps on filling paragraphs",
            "beta closes the whole document",
        ]
        .join("\n\n");
        // Uniformly mediocre chunks
        let uniform = [
            "gamma is only partly relevant here",
            "gamma is only partly relevant there",
            "gamma is only partly relevant again",
        ]
        .join("\n\n");

        add(&indexer, "uniform", "Uniform", &uniform).await;
        add(&indexer, "mixed", "Mixed", &mixed).await;
        assert_eq!(indexer.store().get_chunks("mixed").unwrap().len(), 5);

        let results = retriever.search("alpha", SearchMode::Vector, None).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].doc_id, "mixed");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[0].chunk_index, 0);
        assert!((results[1].score - 0.6).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_top_k_bound() {
        let (indexer, retriever) = setup(Arc::new(HashingEmbedder::default()), ChunkerConfig::default());
        for i in 0..8 {
            add(
                &indexer,
                &format!("doc-{i}"),
                &format!("Doc {i}"),
                &format!("Regression topic number {i} covers residuals and variance."),
            )
            .await;
        }

        for mode in [SearchMode::Vector, SearchMode::Keyword, SearchMode::Hybrid] {
            for k in [1, 3, 5, 20] {
                let results = retriever.search("regression variance", mode, Some(k)).await.unwrap();
                assert!(results.len() <= k, "{mode} returned more than {k}");
                assert_sorted(&results);
            }
        }

        let default_k = retriever
            .search("regression", SearchMode::Hybrid, None)
            .await
            .unwrap();
        assert_eq!(default_k.len(), 5);
    }

    #[tokio::test]
    async fn test_keyword_mode_only_returns_matches() {
        let (indexer, retriever) = setup(Arc::new(HashingEmbedder::default()), ChunkerConfig::default());
        add(&indexer, "anova", "ANOVA", "Analysis of variance compares group means.").await;
        add(&indexer, "chart", "Charts", "Bar charts show categories.").await;

        let results = retriever
            .search("variance", SearchMode::Keyword, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "anova");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_empty_index_and_blank_query() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (indexer, retriever) = setup(embedder.clone(), ChunkerConfig::default());

        let results = retriever.search("anything", SearchMode::Hybrid, None).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls(), 0);

        add(&indexer, "empty", "Empty", "").await;
        let results = retriever.search("anything", SearchMode::Vector, None).await.unwrap();
        assert!(results.is_empty());

        add(&indexer, "doc", "Doc", "some content").await;
        let calls = embedder.calls();
        assert!(retriever.search("   ", SearchMode::Hybrid, None).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), calls);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let (indexer, retriever) = setup(Arc::new(HashingEmbedder::default()), ChunkerConfig::default());
        add(&indexer, "second", "B", "identical text about sampling").await;
        add(&indexer, "first", "A", "identical text about sampling").await;

        let results = retriever
            .search("sampling", SearchMode::Vector, None)
            .await
            .unwrap();

        assert_eq!(results[0].doc_id, "second");
        assert_eq!(results[1].doc_id, "first");
        assert_eq!(results[0].score, results[1].score);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_propagates() {
        let (indexer, retriever) = setup(failing_on("FAIL"), ChunkerConfig::default());
        add(&indexer, "doc", "Doc", "harmless content").await;

        let result = retriever.search("FAIL please", SearchMode::Hybrid, None).await;
        assert!(matches!(result, Err(RetrieverError::Embedding(_))));

        // The keyword path never embeds
        let keyword = retriever
            .search("FAIL harmless", SearchMode::Keyword, None)
            .await
            .unwrap();
        assert_eq!(keyword.len(), 1);
    }

    /// Commits a queued chunk generation right after the first ranking read, the way a
    /// concurrent update finishing mid-query would
    struct RacingStore {
        inner: SqliteStore,
        queued: parking_lot::Mutex<Option<(Document, Vec<Chunk>)>>,
    }

    impl RacingStore {
        fn commit_queued(&self) {
            if let Some((doc, chunks)) = self.queued.lock().take() {
                self.inner.write_generation(&doc, &chunks).unwrap();
            }
        }
    }

    impl DocumentStorage for RacingStore {
        fn get_document(&self, doc_id: &str) -> storage::Result<Option<Document>> {
            self.inner.get_document(doc_id)
        }
        fn list_documents(&self, library: Option<&str>) -> storage::Result<Vec<Document>> {
            self.inner.list_documents(library)
        }
        fn document_ids(&self) -> storage::Result<Vec<String>> {
            self.inner.document_ids()
        }
        fn save_document_metadata(&self, doc: &Document) -> storage::Result<bool> {
            self.inner.save_document_metadata(doc)
        }
        fn delete_document(&self, doc_id: &str) -> storage::Result<bool> {
            self.inner.delete_document(doc_id)
        }
    }

    impl ChunkStorage for RacingStore {
        fn write_generation(&self, doc: &Document, chunks: &[Chunk]) -> storage::Result<()> {
            self.inner.write_generation(doc, chunks)
        }
        fn get_chunks(&self, doc_id: &str) -> storage::Result<Vec<Chunk>> {
            self.inner.get_chunks(doc_id)
        }
        fn scan_vectors(&self, embedding_model: &str) -> storage::Result<Vec<ChunkVector>> {
            let vectors = self.inner.scan_vectors(embedding_model);
            self.commit_queued();
            vectors
        }
        fn keyword_search(&self, query: &str) -> storage::Result<Vec<KeywordHit>> {
            let hits = self.inner.keyword_search(query);
            self.commit_queued();
            hits
        }
        fn hybrid_snapshot(
            &self,
            embedding_model: &str,
            query: &str,
        ) -> storage::Result<(Vec<ChunkVector>, Vec<KeywordHit>)> {
            let snapshot = self.inner.hybrid_snapshot(embedding_model, query);
            self.commit_queued();
            snapshot
        }
        fn count_chunks(&self) -> storage::Result<usize> {
            self.inner.count_chunks()
        }
    }

    impl IndexStorage for RacingStore {
        fn stats(&self) -> storage::Result<StoreStats> {
            self.inner.stats()
        }
    }

    #[tokio::test]
    async fn test_hybrid_query_sees_one_generation() {
        let embedder = HashingEmbedder::new(64);
        let racing = Arc::new(RacingStore {
            inner: SqliteStore::in_memory().unwrap(),
            queued: parking_lot::Mutex::new(None),
        });
        let store: Arc<dyn IndexStorage> = racing.clone();
        let indexer = Indexer::new(
            Arc::clone(&store),
            Arc::new(embedder.clone()),
            TextChunker::new(ChunkerConfig::default()).unwrap(),
        );
        let retriever = Retriever::new(store, Arc::new(embedder.clone()), RetrievalConfig::default());
        add(&indexer, "d", "Sampling", "OLD generation about sampling").await;

        let mut doc = indexer.get("d").unwrap().unwrap();
        doc.content = "NEW generation about sampling".to_string();
        let chunk = Chunk {
            doc_id: "d".to_string(),
            chunk_index: 0,
            chunk_text: doc.content.clone(),
            chunk_tokens: 7,
            embedding: embedder.embed_text(&doc.content),
            embedding_model: embedder.model_name().to_string(),
            total_chunks: 1,
        };
        *racing.queued.lock() = Some((doc, vec![chunk]));

        let (vector, keyword) = retriever.hybrid_rankings("sampling generation").await.unwrap();
        assert_eq!(vector[0].snippet, "OLD generation about sampling");
        assert_eq!(keyword[0].snippet, vector[0].snippet);

        // The racing write landed after the snapshot and is visible to the next query
        let results = retriever
            .search("sampling generation", SearchMode::Hybrid, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "NEW generation about sampling");
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!("Hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        assert!("semantic".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Keyword.to_string(), "keyword");
    }
}
