//! # Memoria
//!
//! A memory consolidation and retrieval engine for per-user statements.
//!
//! ## Features
//!
//! - **Consolidation:** New statements update, extend, or sit beside the
//!   closest prior memory, decided by an LLM classifier
//! - **Version Chains:** Updates supersede instead of overwrite, so every
//!   earlier version stays retrievable
//! - **Semantic Search:** Only current memories are returned, ranked by
//!   relevance
//! - **PostgreSQL + pgvector:** With an in-memory backend for tests and
//!   ephemeral use
//! - **Local Embeddings:** fastembed, no embedding API required

pub mod config;
pub mod context;
pub mod core;
pub mod database;
pub mod error;
pub mod llm;
pub mod memory;

pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use memory::{ConsolidationEngine, SearchEngine};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
