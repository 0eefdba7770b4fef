//! Local storage for docdex using SQLite
//!
//! Stores documents, their chunk generations with embeddings, and a full-text index
//! over chunk text for keyword search.
//!
//! File-backed stores run in WAL mode with one writer connection and a small pool of
//! query-only reader connections, so reads do not queue behind each other or behind
//! a write in progress.

pub mod traits;

pub use traits::*;

use crate::documents::{Chunk, Document};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding dimension {actual} does not match {expected} already stored for model {model}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid chunk set: {0}")]
    InvalidChunkSet(String),
}

/// SQLite-backed document and chunk store
pub struct SqliteStore {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let writer = Connection::open(path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened writer connection");

        let mut store = Self::with_writer(writer)?;
        for _ in 0..num_cpus::get().clamp(2, 8) {
            let reader = Connection::open(path)?;
            reader.busy_timeout(BUSY_TIMEOUT)?;
            reader.pragma_update(None, "query_only", true)?;
            store.readers.push(Mutex::new(reader));
        }
        Ok(store)
    }

    /// Create an in-memory store (for testing). Reads share the writer connection.
    pub fn in_memory() -> Result<Self> {
        Self::with_writer(Connection::open_in_memory()?)
    }

    fn with_writer(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            writer: Mutex::new(conn),
            readers: Vec::new(),
            next_reader: AtomicUsize::new(0),
        };
        store.migrate()?;
        Ok(store)
    }

    /// An idle reader if there is one, otherwise the next in turn
    fn reader(&self) -> MutexGuard<'_, Connection> {
        if self.readers.is_empty() {
            return self.writer.lock();
        }
        for conn in &self.readers {
            if let Some(guard) = conn.try_lock() {
                return guard;
            }
        }
        let next = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        self.readers[next].lock()
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        self.writer.lock().execute_batch(
            r#"
            -- Documents are the source of truth; rowid keeps insertion order
            CREATE TABLE IF NOT EXISTS documents (
                doc_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                library TEXT NOT NULL,
                category TEXT,
                summary TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Derived chunks, one generation per document
            CREATE TABLE IF NOT EXISTS chunks (
                doc_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                chunk_text TEXT NOT NULL,
                chunk_tokens INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                embedding_model TEXT NOT NULL,
                total_chunks INTEGER NOT NULL,
                PRIMARY KEY (doc_id, chunk_index),
                FOREIGN KEY (doc_id) REFERENCES documents(doc_id) ON DELETE CASCADE
            );

            -- Keyword index over chunk text, kept in step with `chunks` by hand
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
                chunk_text,
                doc_id UNINDEXED,
                chunk_index UNINDEXED,
                tokenize = 'porter unicode61'
            );

            CREATE INDEX IF NOT EXISTS idx_documents_library ON documents(library);
            CREATE INDEX IF NOT EXISTS idx_chunks_model ON chunks(embedding_model);
            "#,
        )?;
        Ok(())
    }

    /// Reject chunk sets that would break contiguity or dimensionality
    fn validate_generation(conn: &Connection, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.doc_id != doc.doc_id {
                return Err(StorageError::InvalidChunkSet(format!(
                    "chunk {} belongs to {}, not {}",
                    chunk.chunk_index, chunk.doc_id, doc.doc_id
                )));
            }
            if chunk.chunk_index as usize != position || chunk.total_chunks as usize != chunks.len()
            {
                return Err(StorageError::InvalidChunkSet(format!(
                    "chunk at position {} has index {} of {}, expected {} of {}",
                    position,
                    chunk.chunk_index,
                    chunk.total_chunks,
                    position,
                    chunks.len()
                )));
            }
        }

        let mut checked: Vec<(&str, usize)> = Vec::new();
        for chunk in chunks {
            let actual = chunk.embedding.len();
            if let Some((_, expected)) = checked.iter().find(|(m, _)| *m == chunk.embedding_model) {
                if *expected != actual {
                    return Err(StorageError::DimensionMismatch {
                        model: chunk.embedding_model.clone(),
                        expected: *expected,
                        actual,
                    });
                }
                continue;
            }

            let stored: Option<i64> = conn
                .query_row(
                    "SELECT length(embedding) FROM chunks WHERE embedding_model = ?1 AND doc_id != ?2 LIMIT 1",
                    params![chunk.embedding_model, doc.doc_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(bytes) = stored {
                let expected = bytes as usize / 4;
                if expected != actual {
                    return Err(StorageError::DimensionMismatch {
                        model: chunk.embedding_model.clone(),
                        expected,
                        actual,
                    });
                }
            }
            checked.push((&chunk.embedding_model, actual));
        }

        Ok(())
    }
}

impl DocumentStorage for SqliteStore {
    fn get_document(&self, doc_id: &str) -> Result<Option<Document>> {
        let conn = self.reader();
        let doc = conn
            .query_row(
                "SELECT doc_id, title, content, library, category, summary, created_at, updated_at
                 FROM documents WHERE doc_id = ?1",
                params![doc_id],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }

    fn list_documents(&self, library: Option<&str>) -> Result<Vec<Document>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT doc_id, title, content, library, category, summary, created_at, updated_at
             FROM documents WHERE ?1 IS NULL OR library = ?1 ORDER BY rowid",
        )?;

        let docs = stmt
            .query_map(params![library], document_from_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(docs)
    }

    fn document_ids(&self) -> Result<Vec<String>> {
        let conn = self.reader();
        let mut stmt = conn.prepare("SELECT doc_id FROM documents ORDER BY rowid")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;
        Ok(ids)
    }

    fn save_document_metadata(&self, doc: &Document) -> Result<bool> {
        let conn = self.writer.lock();
        let changed = conn.execute(
            r#"
            UPDATE documents SET
                title = ?2,
                library = ?3,
                category = ?4,
                summary = ?5,
                updated_at = ?6
            WHERE doc_id = ?1
            "#,
            params![
                doc.doc_id,
                doc.title,
                doc.library,
                doc.category,
                doc.summary,
                doc.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_document(&self, doc_id: &str) -> Result<bool> {
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM chunks_fts WHERE doc_id = ?1", params![doc_id])?;
        // Chunks go with the document through ON DELETE CASCADE
        let deleted = tx.execute("DELETE FROM documents WHERE doc_id = ?1", params![doc_id])?;

        tx.commit()?;
        Ok(deleted > 0)
    }
}

impl ChunkStorage for SqliteStore {
    fn write_generation(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        Self::validate_generation(&tx, doc, chunks)?;

        tx.execute(
            r#"
            INSERT INTO documents (doc_id, title, content, library, category, summary, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(doc_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                library = excluded.library,
                category = excluded.category,
                summary = excluded.summary,
                updated_at = excluded.updated_at
            "#,
            params![
                doc.doc_id,
                doc.title,
                doc.content,
                doc.library,
                doc.category,
                doc.summary,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )?;

        tx.execute("DELETE FROM chunks_fts WHERE doc_id = ?1", params![doc.doc_id])?;
        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", params![doc.doc_id])?;

        {
            let mut insert_chunk = tx.prepare(
                r#"
                INSERT INTO chunks (doc_id, chunk_index, chunk_text, chunk_tokens, embedding, embedding_model, total_chunks)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            let mut insert_fts = tx.prepare(
                "INSERT INTO chunks_fts (chunk_text, doc_id, chunk_index) VALUES (?1, ?2, ?3)",
            )?;

            for chunk in chunks {
                insert_chunk.execute(params![
                    chunk.doc_id,
                    chunk.chunk_index,
                    chunk.chunk_text,
                    chunk.chunk_tokens,
                    encode_embedding(&chunk.embedding),
                    chunk.embedding_model,
                    chunk.total_chunks,
                ])?;
                insert_fts.execute(params![chunk.chunk_text, chunk.doc_id, chunk.chunk_index])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_chunks(&self, doc_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT doc_id, chunk_index, chunk_text, chunk_tokens, embedding, embedding_model, total_chunks
             FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index",
        )?;

        let chunks = stmt
            .query_map(params![doc_id], |row| {
                Ok(Chunk {
                    doc_id: row.get(0)?,
                    chunk_index: row.get(1)?,
                    chunk_text: row.get(2)?,
                    chunk_tokens: row.get(3)?,
                    embedding: embedding_from_row(row, 4)?,
                    embedding_model: row.get(5)?,
                    total_chunks: row.get(6)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(chunks)
    }

    fn scan_vectors(&self, embedding_model: &str) -> Result<Vec<ChunkVector>> {
        select_vectors(&self.reader(), embedding_model)
    }

    fn keyword_search(&self, query: &str) -> Result<Vec<KeywordHit>> {
        select_keyword_hits(&self.reader(), query)
    }

    fn hybrid_snapshot(
        &self,
        embedding_model: &str,
        query: &str,
    ) -> Result<(Vec<ChunkVector>, Vec<KeywordHit>)> {
        let mut conn = self.reader();
        // One read transaction pins both scans to the same committed state
        let tx = conn.transaction()?;
        let vectors = select_vectors(&tx, embedding_model)?;
        let hits = select_keyword_hits(&tx, query)?;
        tx.commit()?;
        Ok((vectors, hits))
    }

    fn count_chunks(&self) -> Result<usize> {
        let count: i64 = self
            .reader()
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl IndexStorage for SqliteStore {
    fn stats(&self) -> Result<StoreStats> {
        let conn = self.reader();
        let documents: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT embedding_model FROM chunks ORDER BY embedding_model")?;
        let embedding_models = stmt
            .query_map([], |row| row.get(0))?
            .collect::<SqliteResult<Vec<String>>>()?;

        Ok(StoreStats {
            documents: documents as usize,
            chunks: chunks as usize,
            embedding_models,
        })
    }
}

fn select_vectors(conn: &Connection, embedding_model: &str) -> Result<Vec<ChunkVector>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.doc_id, c.chunk_index, c.chunk_text, c.embedding
        FROM chunks c
        JOIN documents d ON d.doc_id = c.doc_id
        WHERE c.embedding_model = ?1
        ORDER BY d.rowid, c.chunk_index
        "#,
    )?;

    let vectors = stmt
        .query_map(params![embedding_model], |row| {
            Ok(ChunkVector {
                doc_id: row.get(0)?,
                chunk_index: row.get(1)?,
                chunk_text: row.get(2)?,
                embedding: embedding_from_row(row, 3)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(vectors)
}

fn select_keyword_hits(conn: &Connection, query: &str) -> Result<Vec<KeywordHit>> {
    let Some(fts_query) = build_fts_query(query) else {
        return Ok(vec![]);
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT chunks_fts.doc_id,
               CAST(chunks_fts.chunk_index AS INTEGER),
               chunks_fts.chunk_text,
               bm25(chunks_fts)
        FROM chunks_fts
        JOIN documents d ON d.doc_id = chunks_fts.doc_id
        WHERE chunks_fts MATCH ?1
        ORDER BY bm25(chunks_fts), d.rowid, CAST(chunks_fts.chunk_index AS INTEGER)
        "#,
    )?;

    let hits = stmt
        .query_map(params![fts_query], |row| {
            let bm25: f64 = row.get(3)?;
            Ok(KeywordHit {
                doc_id: row.get(0)?,
                chunk_index: row.get(1)?,
                chunk_text: row.get(2)?,
                // bm25() is lower-is-better; flip it so higher wins
                score: -bm25 as f32,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(hits)
}

/// Serialize an embedding as little-endian f32 bytes
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_embedding`]. Returns None when the length is not a multiple of four.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Turn free text into an FTS5 query matching any of its words.
/// Terms are quoted so FTS operators in user input are treated as text.
fn build_fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn embedding_from_row(row: &Row<'_>, idx: usize) -> SqliteResult<Vec<f32>> {
    let bytes: Vec<u8> = row.get(idx)?;
    decode_embedding(&bytes).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Blob,
            format!("embedding blob of {} bytes is not a whole number of f32", bytes.len()).into(),
        )
    })
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> SqliteResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn document_from_row(row: &Row<'_>) -> SqliteResult<Document> {
    Ok(Document {
        doc_id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        library: row.get(3)?,
        category: row.get(4)?,
        summary: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
        updated_at: parse_timestamp(row, 7)?,
    })
}
