//! In-process storage backend
//!
//! Implements both `VectorStore` and `CounterService` over plain maps behind
//! a single lock. Nothing is persisted; useful for tests and for running
//! the engines without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::storage::{CounterService, VectorStore, WriteBatch};
use crate::core::types::{Memory, MemoryRelation, MemoryState, ScoredMemory, SearchFilter};
use crate::error::{Error, Result};

/// Distance function between two embeddings
pub type DistanceFn = fn(&[f32], &[f32]) -> f64;

/// Cosine distance (`1 - cosine similarity`), computed in f64
///
/// Vectors of different lengths, or with zero norm, are maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Default)]
struct Inner {
    memories: HashMap<Uuid, Memory>,
    relations: Vec<MemoryRelation>,
    counts: HashMap<String, i64>,
}

/// In-memory vector store and counter
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    distance: DistanceFn,
}

impl InMemoryStore {
    /// Create an empty store using cosine distance
    pub fn new() -> Self {
        Self::with_distance(cosine_distance)
    }

    /// Create an empty store with a custom distance function
    pub fn with_distance(distance: DistanceFn) -> Self {
        InMemoryStore {
            inner: Arc::new(RwLock::new(Inner::default())),
            distance,
        }
    }

    /// Every memory of a user in any state, oldest first
    pub async fn memories_for(&self, user_id: &str) -> Vec<Memory> {
        let inner = self.inner.read().await;
        let mut memories: Vec<Memory> = inner
            .memories
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memories.sort_by_key(|m| m.created_at);
        memories
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn nearest_active(
        &self,
        user_id: &str,
        embedding: &[f32],
        max_distance: f64,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let inner = self.inner.read().await;

        let mut scored: Vec<ScoredMemory> = inner
            .memories
            .values()
            .filter(|m| m.user_id == user_id && m.state == MemoryState::Active)
            .filter(|m| filter.matches(m))
            .map(|m| ScoredMemory {
                distance: (self.distance)(embedding, &m.embedding),
                memory: m.clone(),
            })
            .filter(|s| s.distance < max_distance)
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn write(&self, batch: &WriteBatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        let memory = &batch.memory;

        if inner.memories.contains_key(&memory.id) {
            return Err(Error::Conflict(format!("memory {} already exists", memory.id)));
        }

        if let Some(candidate) = batch.supersedes {
            let still_active = inner.memories.get(&candidate).map_or(false, |c| {
                c.user_id == memory.user_id && c.state == MemoryState::Active
            });
            if !still_active {
                return Err(Error::Conflict(format!(
                    "memory {} is no longer active",
                    candidate
                )));
            }
        }

        let other_active = inner.memories.values().any(|m| {
            m.user_id == memory.user_id
                && m.root_id == memory.root_id
                && m.state == MemoryState::Active
                && Some(m.id) != batch.supersedes
        });
        if memory.state == MemoryState::Active && other_active {
            return Err(Error::Conflict(format!(
                "chain {} already has an active memory",
                memory.root_id
            )));
        }

        if let Some(candidate) = batch.supersedes {
            if let Some(c) = inner.memories.get_mut(&candidate) {
                c.state = MemoryState::Superseded;
                c.state_changed_at = Some(Utc::now());
            }
        }

        inner.memories.insert(memory.id, memory.clone());

        if let Some(ref relation) = batch.relation {
            inner.relations.push(relation.clone());
        }

        Ok(())
    }

    async fn transition_state(&self, user_id: &str, id: Uuid, to: MemoryState) -> Result<bool> {
        if MemoryState::predecessors(to).is_empty() {
            return Err(Error::InvalidInput(format!(
                "no memory may transition to {}",
                to
            )));
        }

        let mut inner = self.inner.write().await;
        match inner.memories.get_mut(&id) {
            Some(memory) if memory.user_id == user_id && memory.state.can_transition_to(to) => {
                memory.state = to;
                memory.state_changed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Memory>> {
        let inner = self.inner.read().await;
        Ok(inner
            .memories
            .get(&id)
            .filter(|m| m.user_id == user_id)
            .cloned())
    }

    async fn chain(&self, user_id: &str, root_id: Uuid) -> Result<Vec<Memory>> {
        let inner = self.inner.read().await;
        let mut chain: Vec<Memory> = inner
            .memories
            .values()
            .filter(|m| m.user_id == user_id && m.root_id == root_id)
            .cloned()
            .collect();
        chain.sort_by_key(|m| m.version);
        Ok(chain)
    }

    async fn relations(&self, user_id: &str, id: Uuid) -> Result<Vec<MemoryRelation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .relations
            .iter()
            .filter(|r| r.source_id == id || r.target_id == id)
            .filter(|r| {
                inner
                    .memories
                    .get(&r.source_id)
                    .map_or(false, |m| m.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[async_trait]
impl CounterService for InMemoryStore {
    async fn increment(&self, user_id: &str) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let count = inner.counts.entry(user_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement(&self, user_id: &str) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let count = inner.counts.entry(user_id.to_string()).or_insert(0);
        *count = (*count - 1).max(0);
        Ok(*count)
    }

    async fn count(&self, user_id: &str) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.counts.get(user_id).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RelationType;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-12);
        // 3-4-5 triangle: cos = 0.6
        assert!((cosine_distance(&[1.0, 0.0], &[3.0, 4.0]) - 0.4).abs() < 1e-12);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 2.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 2.0);
    }

    #[tokio::test]
    async fn test_nearest_active_orders_and_filters() {
        let store = InMemoryStore::new();
        let near = Memory::new("alice", "near", vec![1.0, 0.1]);
        let far = Memory::new("alice", "far", vec![1.0, 0.6]);
        let too_far = Memory::new("alice", "orthogonal", vec![0.0, 1.0]);
        let other_user = Memory::new("bob", "near too", vec![1.0, 0.0]);

        for memory in [&far, &near, &too_far, &other_user] {
            store.write(&WriteBatch::insert(memory.clone())).await.unwrap();
        }

        let results = store
            .nearest_active("alice", &[1.0, 0.0], 0.5, &SearchFilter::default(), 10)
            .await
            .unwrap();

        let ids: Vec<Uuid> = results.iter().map(|s| s.memory.id).collect();
        assert_eq!(ids, vec![near.id, far.id]);
        assert!(results[0].distance <= results[1].distance);

        let limited = store
            .nearest_active("alice", &[1.0, 0.0], 0.5, &SearchFilter::default(), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_supersede_requires_active_candidate() {
        let store = InMemoryStore::new();
        let first = Memory::new("alice", "I use pnpm", vec![1.0]);
        store.write(&WriteBatch::insert(first.clone())).await.unwrap();

        let second = Memory::successor_of(&first, "I use yarn", vec![1.0]);
        store
            .write(&WriteBatch::supersede(second.clone(), first.id))
            .await
            .unwrap();

        let stale = Memory::successor_of(&first, "I use npm", vec![1.0]);
        let err = store
            .write(&WriteBatch::supersede(stale.clone(), first.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.get("alice", stale.id).await.unwrap().is_none());

        let chain = store.chain("alice", first.id).await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].state, MemoryState::Superseded);
        assert_eq!(chain[1].state, MemoryState::Active);
    }

    #[tokio::test]
    async fn test_transition_state_rules() {
        let store = InMemoryStore::new();
        let memory = Memory::new("alice", "text", vec![1.0]);
        store.write(&WriteBatch::insert(memory.clone())).await.unwrap();

        assert!(!store
            .transition_state("bob", memory.id, MemoryState::Deleted)
            .await
            .unwrap());
        assert!(store
            .transition_state("alice", memory.id, MemoryState::Deleted)
            .await
            .unwrap());
        assert!(!store
            .transition_state("alice", memory.id, MemoryState::Deleted)
            .await
            .unwrap());
        assert!(!store
            .transition_state("alice", memory.id, MemoryState::Superseded)
            .await
            .unwrap());
        assert!(store
            .transition_state("alice", memory.id, MemoryState::Active)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_relations_are_user_scoped() {
        let store = InMemoryStore::new();
        let prior = Memory::new("alice", "dark mode", vec![1.0]);
        let newer = Memory::new("alice", "large fonts", vec![1.0]);
        store.write(&WriteBatch::insert(prior.clone())).await.unwrap();
        let relation = MemoryRelation::new(newer.id, prior.id, RelationType::Similar, 0.2);
        store.write(&WriteBatch::relate(newer.clone(), relation)).await.unwrap();

        assert_eq!(store.relations("alice", prior.id).await.unwrap().len(), 1);
        assert_eq!(store.relations("alice", newer.id).await.unwrap().len(), 1);
        assert!(store.relations("bob", prior.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counter_never_negative() {
        let store = InMemoryStore::new();
        assert_eq!(store.count("alice").await.unwrap(), 0);
        assert_eq!(store.increment("alice").await.unwrap(), 1);
        assert_eq!(store.decrement("alice").await.unwrap(), 0);
        assert_eq!(store.decrement("alice").await.unwrap(), 0);
    }
}
