//! Storage configuration types
//!
//! Configuration for the vector store backend and the embedding model.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Primary storage backend
    #[serde(default)]
    pub backend: StorageBackendType,
    /// PostgreSQL configuration
    pub postgres: Option<PostgresConfig>,
    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendType {
    /// PostgreSQL with pgvector
    #[default]
    Postgres,
    /// In-memory (no persistence)
    Memory,
}

impl std::str::FromStr for StorageBackendType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StorageBackendType::Postgres),
            "memory" | "in-memory" => Ok(StorageBackendType::Memory),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid storage backend: {}. Valid options: postgres, memory",
                s
            ))),
        }
    }
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database URL
    #[serde(skip_serializing)]
    pub url: SecretString,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    /// Configuration for `url` with default pool settings
    pub fn new(url: impl Into<String>) -> Self {
        PostgresConfig {
            url: SecretString::from(url.into()),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimensions
    #[serde(default = "default_embedding_dims")]
    pub dimensions: u32,
    /// Maximum cached query embeddings
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Show model download progress on first use
    #[serde(default)]
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            model: default_embedding_model(),
            dimensions: default_embedding_dims(),
            cache_capacity: default_cache_capacity(),
            show_download_progress: false,
        }
    }
}

fn default_embedding_model() -> String {
    "multilingual-e5-small".to_string()
}

fn default_embedding_dims() -> u32 {
    384
}

fn default_cache_capacity() -> u64 {
    1000
}
