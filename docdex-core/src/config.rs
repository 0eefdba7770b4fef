//! Engine configuration
//!
//! Every section has defaults, so an absent or partial `config.toml` is valid.

use crate::embeddings::ChunkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the optional config file inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Name of the SQLite database inside the data directory
pub const DATABASE_FILE: &str = "docdex.db";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote inference service
    #[default]
    Http,
    /// Local feature hashing, no network
    Hashing,
}

/// Configuration for the embedding client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// URL receiving `POST { model, input }`
    pub endpoint: String,
    pub model: String,
    /// Input is cut to this many characters before the call
    pub max_input_chars: usize,
    pub timeout_secs: u64,
    /// Expected vector length; responses of another length are rejected
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Http,
            endpoint: "http://localhost:11434/api/embeddings".to_string(),
            model: "nomic-embed-text".to_string(),
            max_input_chars: 8192,
            timeout_secs: 30,
            dimension: None,
        }
    }
}

/// Ranking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not pass a limit
    pub top_k: usize,
    /// Reciprocal rank fusion constant
    pub rrf_k: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            rrf_k: 60.0,
        }
    }
}

/// Batch reindexing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Documents processed concurrently
    pub workers: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            workers: (num_cpus::get() / 2).max(1),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base directory for the database and config file
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub rebuild: RebuildConfig,
}

impl EngineConfig {
    /// Create a config with defaults rooted at `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load `<data_dir>/config.toml` if present, otherwise defaults.
    /// `data_dir` always wins over a value in the file.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(CONFIG_FILE);

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            Self::from_toml(&raw).map_err(|message| ConfigError::Parse {
                path: path.clone(),
                message,
            })?
        } else {
            Self::default()
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// Get database path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            embedding: EmbeddingConfig::default(),
            chunking: ChunkerConfig::default(),
            retrieval: RetrievalConfig::default(),
            rebuild: RebuildConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::new("/data/docdex");

        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.chunking.max_tokens, 512);
        assert!(config.rebuild.workers >= 1);
        assert_eq!(config.database_path(), PathBuf::from("/data/docdex/docdex.db"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).unwrap();

        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.embedding, EmbeddingConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
            [embedding]
            provider = "hashing"
            dimension = 256

            [retrieval]
            top_k = 10
            "#,
        )
        .unwrap();

        let config = EngineConfig::load(dir.path()).unwrap();

        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding.dimension, Some(256));
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.rrf_k, 60.0);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[retrieval]\ntop_k = \"five\"").unwrap();

        assert!(matches!(
            EngineConfig::load(dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
