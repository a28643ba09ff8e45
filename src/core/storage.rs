//! Storage traits - Abstract interfaces for persistence backends
//!
//! This module defines the capabilities the engines need from persistence:
//! - `VectorStore`: memory records, relations, and nearest-neighbor queries
//! - `CounterService`: per-user memory counts
//!
//! Implementations:
//! - PostgreSQL + pgvector (`database::PgMemoryStore`, `database::PgCounterStore`)
//! - In-process maps for tests and ephemeral deployments (`database::InMemoryStore`)

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{Memory, MemoryRelation, MemoryState, ScoredMemory, SearchFilter};
use crate::error::Result;

/// Everything one consolidation decision writes
///
/// Stores apply a batch atomically: either all of it becomes visible or
/// none of it does.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    /// The newly created memory (always Active)
    pub memory: Memory,
    /// Candidate to move from Active to Superseded
    pub supersedes: Option<Uuid>,
    /// Relation from the new memory to the candidate
    pub relation: Option<MemoryRelation>,
}

impl WriteBatch {
    /// Insert a memory with no side effects on other records
    pub fn insert(memory: Memory) -> Self {
        WriteBatch {
            memory,
            supersedes: None,
            relation: None,
        }
    }

    /// Insert a memory and supersede `candidate`
    pub fn supersede(memory: Memory, candidate: Uuid) -> Self {
        WriteBatch {
            memory,
            supersedes: Some(candidate),
            relation: None,
        }
    }

    /// Insert a memory and link it to a prior one
    pub fn relate(memory: Memory, relation: MemoryRelation) -> Self {
        WriteBatch {
            memory,
            supersedes: None,
            relation: Some(relation),
        }
    }
}

/// Abstract interface for memory persistence with similarity search
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    /// Active memories of `user_id` strictly closer than `max_distance`,
    /// nearest first, at most `limit` of them
    async fn nearest_active(
        &self,
        user_id: &str,
        embedding: &[f32],
        max_distance: f64,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>>;

    /// Apply a batch atomically
    ///
    /// If `batch.supersedes` is no longer Active for the user, nothing is
    /// written and `Error::Conflict` is returned.
    async fn write(&self, batch: &WriteBatch) -> Result<()>;

    /// Move a memory owned by `user_id` to `to`
    ///
    /// Returns `false` when the memory does not exist, belongs to someone
    /// else, or is not in a state that may transition to `to`.
    async fn transition_state(&self, user_id: &str, id: Uuid, to: MemoryState) -> Result<bool>;

    /// Fetch a memory in any state
    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Memory>>;

    /// Every memory of a chain, ordered by version
    async fn chain(&self, user_id: &str, root_id: Uuid) -> Result<Vec<Memory>>;

    /// Relations where the memory is source or target, oldest first
    async fn relations(&self, user_id: &str, id: Uuid) -> Result<Vec<MemoryRelation>>;

    /// Health check
    async fn health_check(&self) -> Result<bool>;
}

/// Abstract interface for per-user memory counts
#[async_trait]
pub trait CounterService: Send + Sync {
    /// Add one memory to the user's count, returning the new count
    async fn increment(&self, user_id: &str) -> Result<i64>;

    /// Remove one memory from the user's count (never below zero)
    async fn decrement(&self, user_id: &str) -> Result<i64>;

    /// Current count
    async fn count(&self, user_id: &str) -> Result<i64>;
}
