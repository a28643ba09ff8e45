//! Core module - Fundamental traits and types for memoria
//!
//! This module defines the abstractions the engines are written against:
//! - Provider traits for the embedding, expansion, and classification models
//! - Storage traits for the vector store and the counter service
//! - Domain types: memories, their lifecycle, relations, request/response shapes
//!
//! Concrete backends live in `database` and `memory`; the engines only see
//! these traits, which keeps them testable with in-process fakes.

pub mod provider;
pub mod storage;
pub mod types;

// Re-export core traits for convenient access
pub use provider::{
    EmbeddingProvider, FixedClassifier, PassthroughExpander, RelationshipClassifier, TextExpander,
};
pub use storage::{CounterService, VectorStore, WriteBatch};
pub use types::*;
