//! Consolidation engine
//!
//! Decides, for every saved statement, whether it replaces, extends, or
//! merely resembles the user's closest prior memory, and writes the outcome
//! atomically. Also owns deletion and the read-side lookups over chains.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::core::provider::{EmbeddingProvider, RelationshipClassifier, TextExpander};
use crate::core::storage::{CounterService, VectorStore, WriteBatch};
use crate::core::types::{
    Memory, MemoryRelation, MemoryState, Relationship, SaveMemoryRequest, SaveMemoryResponse,
    SaveStatus, ScoredMemory, SearchFilter,
};
use crate::error::{Error, Result};

use super::background::BackgroundTasks;
use super::embedding::embed_within;
use super::locks::UserLocks;

/// What a consolidation decision wrote
struct Outcome {
    response: SaveMemoryResponse,
    counts_as_new: bool,
}

/// Orchestrates saves and deletes
#[derive(Clone)]
pub struct ConsolidationEngine {
    store: Arc<dyn VectorStore>,
    counter: Arc<dyn CounterService>,
    embedder: Arc<dyn EmbeddingProvider>,
    expander: Arc<dyn TextExpander>,
    classifier: Arc<dyn RelationshipClassifier>,
    background: Arc<BackgroundTasks>,
    locks: UserLocks,
    config: EngineConfig,
}

impl ConsolidationEngine {
    /// Create a new consolidation engine
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn VectorStore>,
        counter: Arc<dyn CounterService>,
        embedder: Arc<dyn EmbeddingProvider>,
        expander: Arc<dyn TextExpander>,
        classifier: Arc<dyn RelationshipClassifier>,
        background: Arc<BackgroundTasks>,
        config: EngineConfig,
    ) -> Self {
        ConsolidationEngine {
            store,
            counter,
            embedder,
            expander,
            classifier,
            background,
            locks: UserLocks::new(config.user_lock_idle),
            config,
        }
    }

    /// Save a statement, consolidating it against the closest prior memory
    pub async fn save(&self, user_id: &str, request: SaveMemoryRequest) -> Result<SaveMemoryResponse> {
        validate_user(user_id)?;
        request.validate()?;

        let (category, project) = request.normalized_tags();
        let expanded = self.expand(&request.content).await;
        let embedding = embed_within(self.embedder.as_ref(), &expanded, self.config.embed_timeout).await?;

        let outcome = {
            let _guard = self.locks.acquire(user_id).await;

            let nearest = self
                .store
                .nearest_active(
                    user_id,
                    &embedding,
                    self.config.similarity_threshold,
                    &SearchFilter::default(),
                    1,
                )
                .await?
                .into_iter()
                .next();

            let draft = |memory: Memory| {
                memory
                    .with_category(category.clone())
                    .with_project(project.clone())
                    .with_source(request.source.clone())
                    .with_expanded_content(expanded.clone())
            };

            match nearest {
                None => {
                    let memory = draft(Memory::new(user_id, &request.content, embedding));
                    self.store.write(&WriteBatch::insert(memory.clone())).await?;
                    info!("Saved memory {} for user={} (no close match)", memory.id, user_id);
                    Outcome {
                        response: SaveMemoryResponse {
                            id: memory.id,
                            status: SaveStatus::Saved,
                            superseded: None,
                        },
                        counts_as_new: true,
                    }
                }
                Some(candidate) => {
                    let relationship = self.classify(&candidate.memory.content, &request.content).await;
                    debug!(
                        "Candidate {} at distance {:.4} classified as {}",
                        candidate.memory.id, candidate.distance, relationship
                    );
                    self.apply(user_id, &request.content, embedding, candidate, relationship, draft)
                        .await?
                }
            }
        };

        if outcome.counts_as_new {
            self.background.increment_count(user_id).await;
        }

        Ok(outcome.response)
    }

    async fn apply(
        &self,
        user_id: &str,
        content: &str,
        embedding: Vec<f32>,
        candidate: ScoredMemory,
        relationship: Relationship,
        draft: impl Fn(Memory) -> Memory,
    ) -> Result<Outcome> {
        let Some(relation_type) = relationship.relation_type() else {
            let memory = draft(Memory::successor_of(&candidate.memory, content, embedding));
            self.store
                .write(&WriteBatch::supersede(memory.clone(), candidate.memory.id))
                .await?;
            info!(
                "Memory {} supersedes {} for user={} (version {})",
                memory.id, candidate.memory.id, user_id, memory.version
            );
            return Ok(Outcome {
                response: SaveMemoryResponse {
                    id: memory.id,
                    status: SaveStatus::Updated,
                    superseded: Some(candidate.memory.id),
                },
                counts_as_new: false,
            });
        };

        let memory = draft(Memory::new(user_id, content, embedding));
        let relation = MemoryRelation::new(memory.id, candidate.memory.id, relation_type, candidate.distance);
        self.store
            .write(&WriteBatch::relate(memory.clone(), relation))
            .await?;
        info!(
            "Saved memory {} for user={} ({} {})",
            memory.id, user_id, relation_type, candidate.memory.id
        );

        let status = match relationship {
            Relationship::Extend => SaveStatus::Extended,
            _ => SaveStatus::Saved,
        };
        Ok(Outcome {
            response: SaveMemoryResponse {
                id: memory.id,
                status,
                superseded: None,
            },
            counts_as_new: true,
        })
    }

    /// Expand `content`, falling back to it unchanged
    async fn expand(&self, content: &str) -> String {
        match tokio::time::timeout(self.config.expand_timeout, self.expander.expand(content)).await {
            Ok(Ok(expanded)) if !expanded.trim().is_empty() => expanded,
            Ok(Ok(_)) => {
                warn!("Expander returned empty text, using original content");
                content.to_string()
            }
            Ok(Err(e)) => {
                warn!("Expansion failed, using original content: {}", e);
                content.to_string()
            }
            Err(_) => {
                warn!(
                    "Expansion timed out after {:?}, using original content",
                    self.config.expand_timeout
                );
                content.to_string()
            }
        }
    }

    /// Classify, treating any failure as `Similar`
    async fn classify(&self, existing: &str, new: &str) -> Relationship {
        match tokio::time::timeout(self.config.classify_timeout, self.classifier.classify(existing, new))
            .await
        {
            Ok(Ok(relationship)) => relationship,
            Ok(Err(e)) => {
                warn!("Classification failed, treating as similar: {}", e);
                Relationship::Similar
            }
            Err(_) => {
                warn!(
                    "Classification timed out after {:?}, treating as similar",
                    self.config.classify_timeout
                );
                Relationship::Similar
            }
        }
    }

    /// Delete a memory; `true` only for the call that performed the deletion
    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<bool> {
        validate_user(user_id)?;

        let deleted = self
            .store
            .transition_state(user_id, id, MemoryState::Deleted)
            .await?;

        if deleted {
            info!("Deleted memory {} for user={}", id, user_id);
            self.background.decrement_count(user_id).await;
        } else {
            debug!("Nothing to delete for memory {} user={}", id, user_id);
        }

        Ok(deleted)
    }

    /// Fetch a memory in any state
    pub async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Memory>> {
        validate_user(user_id)?;
        self.store.get(user_id, id).await
    }

    /// Every version of the chain containing `id`, oldest first
    pub async fn history(&self, user_id: &str, id: Uuid) -> Result<Vec<Memory>> {
        validate_user(user_id)?;
        match self.store.get(user_id, id).await? {
            Some(memory) => self.store.chain(user_id, memory.root_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Relations where `id` is source or target
    pub async fn relations(&self, user_id: &str, id: Uuid) -> Result<Vec<MemoryRelation>> {
        validate_user(user_id)?;
        self.store.relations(user_id, id).await
    }

    /// Current memory count of the user
    pub async fn count(&self, user_id: &str) -> Result<i64> {
        validate_user(user_id)?;
        self.counter.count(user_id).await
    }

    /// Wait for queued counter updates to land
    pub async fn flush(&self) {
        self.background.flush().await;
    }
}

pub(crate) fn validate_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::InvalidInput("user id must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{FixedClassifier, PassthroughExpander};
    use crate::core::types::RelationType;
    use crate::database::InMemoryStore;
    use crate::memory::testing::{
        quantized_distance, FailingExpander, ScriptedClassifier, ScriptedEmbedder, SuffixExpander,
    };
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryStore>,
        engine: ConsolidationEngine,
    }

    fn harness(
        embedder: ScriptedEmbedder,
        classifier: Arc<dyn RelationshipClassifier>,
        expander: Arc<dyn TextExpander>,
    ) -> Harness {
        let store = Arc::new(InMemoryStore::with_distance(quantized_distance));
        let background = Arc::new(BackgroundTasks::spawn(store.clone(), 16));
        let config = EngineConfig {
            classify_timeout: Duration::from_millis(100),
            expand_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let engine = ConsolidationEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(embedder),
            expander,
            classifier,
            background,
            config,
        );
        Harness { store, engine }
    }

    fn with_verdict(embedder: ScriptedEmbedder, verdict: Relationship) -> Harness {
        harness(
            embedder,
            Arc::new(ScriptedClassifier::answering(verdict)),
            Arc::new(PassthroughExpander),
        )
    }

    #[tokio::test]
    async fn test_first_save_is_an_originator() {
        let h = with_verdict(ScriptedEmbedder::new(1).with("I use vim", vec![0.0]), Relationship::Update);

        let response = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        assert_eq!(response.status, SaveStatus::Saved);
        assert!(response.superseded.is_none());

        let memory = h.engine.get("alice", response.id).await.unwrap().unwrap();
        assert_eq!(memory.version, 1);
        assert_eq!(memory.state, MemoryState::Active);
        assert_eq!(memory.root_id, memory.id);
        assert_eq!(memory.source, "api");

        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_chain() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I switched to neovim", vec![0.1])
            .with("Actually I use helix now", vec![0.2]);
        let h = with_verdict(embedder, Relationship::Update);

        let first = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        let second = h
            .engine
            .save("alice", SaveMemoryRequest::new("I switched to neovim"))
            .await
            .unwrap();
        let third = h
            .engine
            .save("alice", SaveMemoryRequest::new("Actually I use helix now"))
            .await
            .unwrap();

        assert_eq!(second.status, SaveStatus::Updated);
        assert_eq!(second.superseded, Some(first.id));
        assert_eq!(third.superseded, Some(second.id));

        let chain = h.engine.history("alice", first.id).await.unwrap();
        let versions: Vec<i32> = chain.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(chain.iter().all(|m| m.root_id == first.id));
        assert_eq!(
            chain.iter().filter(|m| m.state == MemoryState::Active).count(),
            1
        );
        assert_eq!(chain[2].id, third.id);
        assert_eq!(chain[1].supersedes_id, Some(first.id));

        // Superseded memories stay retrievable by id
        let old = h.engine.get("alice", first.id).await.unwrap().unwrap();
        assert_eq!(old.state, MemoryState::Superseded);
        assert!(old.state_changed_at.is_some());

        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_similar_creates_relation() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I like dark mode", vec![0.0])
            .with("I like large fonts", vec![0.25]);
        let h = with_verdict(embedder, Relationship::Similar);

        let first = h.engine.save("alice", SaveMemoryRequest::new("I like dark mode")).await.unwrap();
        let second = h
            .engine
            .save("alice", SaveMemoryRequest::new("I like large fonts"))
            .await
            .unwrap();

        assert_eq!(second.status, SaveStatus::Saved);
        assert!(second.superseded.is_none());

        let relations = h.engine.relations("alice", first.id).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source_id, second.id);
        assert_eq!(relations[0].target_id, first.id);
        assert_eq!(relations[0].relation_type, RelationType::Similar);
        assert_eq!(relations[0].strength, 0.75);

        let both_active = h
            .store
            .memories_for("alice")
            .await
            .iter()
            .all(|m| m.state == MemoryState::Active && m.version == 1);
        assert!(both_active);

        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_extend_creates_relation() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I write Rust", vec![0.5])
            .with("I write Rust with tokio", vec![0.6]);
        let h = with_verdict(embedder, Relationship::Extend);

        let first = h.engine.save("alice", SaveMemoryRequest::new("I write Rust")).await.unwrap();
        let second = h
            .engine
            .save("alice", SaveMemoryRequest::new("I write Rust with tokio"))
            .await
            .unwrap();

        assert_eq!(second.status, SaveStatus::Extended);
        let relations = h.engine.relations("alice", second.id).await.unwrap();
        assert_eq!(relations[0].relation_type, RelationType::Extends);
        assert_eq!(relations[0].target_id, first.id);
        assert_eq!(relations[0].strength, 0.9);
    }

    #[tokio::test]
    async fn test_classifier_failure_counts_as_similar() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I switched to neovim", vec![0.1]);
        let classifier = Arc::new(ScriptedClassifier::failing());
        let h = harness(embedder, classifier.clone(), Arc::new(PassthroughExpander));

        let first = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        let second = h
            .engine
            .save("alice", SaveMemoryRequest::new("I switched to neovim"))
            .await
            .unwrap();

        assert_eq!(classifier.calls(), 1);
        assert_eq!(second.status, SaveStatus::Saved);
        let relations = h.engine.relations("alice", first.id).await.unwrap();
        assert_eq!(relations[0].relation_type, RelationType::Similar);
        let first = h.engine.get("alice", first.id).await.unwrap().unwrap();
        assert_eq!(first.state, MemoryState::Active);
    }

    #[tokio::test]
    async fn test_classifier_timeout_counts_as_similar() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I switched to neovim", vec![0.1]);
        let classifier = Arc::new(
            ScriptedClassifier::answering(Relationship::Update).with_delay(Duration::from_secs(5)),
        );
        let h = harness(embedder, classifier, Arc::new(PassthroughExpander));

        h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        let second = h
            .engine
            .save("alice", SaveMemoryRequest::new("I switched to neovim"))
            .await
            .unwrap();
        assert_eq!(second.status, SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_similarity_threshold_is_exclusive() {
        let embedder = ScriptedEmbedder::new(1)
            .with("base", vec![0.0])
            .with("at threshold", vec![0.3])
            .with("just inside", vec![-0.2999]);
        let classifier = Arc::new(ScriptedClassifier::answering(Relationship::Update));
        let h = harness(embedder, classifier.clone(), Arc::new(PassthroughExpander));

        h.engine.save("alice", SaveMemoryRequest::new("base")).await.unwrap();

        let at = h.engine.save("alice", SaveMemoryRequest::new("at threshold")).await.unwrap();
        assert_eq!(at.status, SaveStatus::Saved);
        assert_eq!(classifier.calls(), 0);

        // 0.2999 from "base", 0.5999 from "at threshold"
        let inside = h.engine.save("alice", SaveMemoryRequest::new("just inside")).await.unwrap();
        assert_eq!(inside.status, SaveStatus::Updated);
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let h = with_verdict(ScriptedEmbedder::new(1), Relationship::Similar);

        let err = h
            .engine
            .save("alice", SaveMemoryRequest::new("unembeddable"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert!(h.store.memories_for("alice").await.is_empty());

        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_timeout_is_reported() {
        let embedder = ScriptedEmbedder::new(1)
            .with("slow", vec![0.0])
            .with_delay(Duration::from_millis(200));
        let store = Arc::new(InMemoryStore::with_distance(quantized_distance));
        let background = Arc::new(BackgroundTasks::spawn(store.clone(), 4));
        let config = EngineConfig {
            embed_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let engine = ConsolidationEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(embedder),
            Arc::new(PassthroughExpander),
            Arc::new(FixedClassifier::default()),
            background,
            config,
        );

        let err = engine.save("alice", SaveMemoryRequest::new("slow")).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(store.memories_for("alice").await.is_empty());
    }

    #[tokio::test]
    async fn test_expansion_feeds_the_embedding() {
        let embedder = ScriptedEmbedder::new(1).with("use vim (expanded)", vec![0.0]);
        let h = harness(
            embedder,
            Arc::new(FixedClassifier::default()),
            Arc::new(SuffixExpander(" (expanded)")),
        );

        let saved = h.engine.save("alice", SaveMemoryRequest::new("use vim")).await.unwrap();
        let memory = h.engine.get("alice", saved.id).await.unwrap().unwrap();
        assert_eq!(memory.content, "use vim");
        assert_eq!(memory.expanded_content.as_deref(), Some("use vim (expanded)"));
    }

    #[tokio::test]
    async fn test_expansion_failure_uses_original_content() {
        let embedder = ScriptedEmbedder::new(1).with("use vim", vec![0.0]);
        let h = harness(
            embedder,
            Arc::new(FixedClassifier::default()),
            Arc::new(FailingExpander),
        );

        let saved = h.engine.save("alice", SaveMemoryRequest::new("use vim")).await.unwrap();
        let memory = h.engine.get("alice", saved.id).await.unwrap().unwrap();
        assert!(memory.expanded_content.is_none());
    }

    #[tokio::test]
    async fn test_update_tags_supplied_value_wins_else_inherited() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I use neovim", vec![0.1])
            .with("I use helix", vec![0.2]);
        let h = with_verdict(embedder, Relationship::Update);

        h.engine
            .save(
                "alice",
                SaveMemoryRequest::new("I use vim")
                    .with_category("tools")
                    .with_project("My Dotfiles"),
            )
            .await
            .unwrap();

        let inherited = h.engine.save("alice", SaveMemoryRequest::new("I use neovim")).await.unwrap();
        let memory = h.engine.get("alice", inherited.id).await.unwrap().unwrap();
        assert_eq!(memory.category.as_deref(), Some("tools"));
        assert_eq!(memory.project.as_deref(), Some("my-dotfiles"));

        let overridden = h
            .engine
            .save("alice", SaveMemoryRequest::new("I use helix").with_project("work_laptop"))
            .await
            .unwrap();
        let memory = h.engine.get("alice", overridden.id).await.unwrap().unwrap();
        assert_eq!(memory.category.as_deref(), Some("tools"));
        assert_eq!(memory.project.as_deref(), Some("work-laptop"));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I use neovim", vec![0.1]);
        let h = with_verdict(embedder, Relationship::Update);

        let alice = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        let bob = h.engine.save("bob", SaveMemoryRequest::new("I use neovim")).await.unwrap();

        assert_eq!(bob.status, SaveStatus::Saved);
        assert!(h.engine.get("bob", alice.id).await.unwrap().is_none());
        assert!(!h.engine.delete("bob", alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let h = with_verdict(ScriptedEmbedder::new(1).with("I use vim", vec![0.0]), Relationship::Similar);

        let saved = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 1);

        assert!(h.engine.delete("alice", saved.id).await.unwrap());
        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 0);

        assert!(!h.engine.delete("alice", saved.id).await.unwrap());
        assert!(!h.engine.delete("alice", Uuid::new_v4()).await.unwrap());
        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 0);

        let memory = h.engine.get("alice", saved.id).await.unwrap().unwrap();
        assert_eq!(memory.state, MemoryState::Deleted);
    }

    #[tokio::test]
    async fn test_delete_superseded_version() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I switched to neovim", vec![0.1])
            .with("I drink tea", vec![0.9]);
        let h = with_verdict(embedder, Relationship::Update);

        let v1 = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        let v2 = h
            .engine
            .save("alice", SaveMemoryRequest::new("I switched to neovim"))
            .await
            .unwrap();
        let other = h.engine.save("alice", SaveMemoryRequest::new("I drink tea")).await.unwrap();
        assert_eq!(v2.superseded, Some(v1.id));
        assert_eq!(other.status, SaveStatus::Saved);
        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 2);

        assert!(h.engine.delete("alice", v1.id).await.unwrap());
        assert!(!h.engine.delete("alice", v1.id).await.unwrap());
        h.engine.flush().await;
        assert_eq!(h.engine.count("alice").await.unwrap(), 1);

        let chain = h.engine.history("alice", v2.id).await.unwrap();
        let states: Vec<(Uuid, MemoryState)> = chain.iter().map(|m| (m.id, m.state)).collect();
        assert_eq!(
            states,
            vec![(v1.id, MemoryState::Deleted), (v2.id, MemoryState::Active)]
        );
    }

    /// Store whose candidate is deleted between the nearest lookup and the write
    struct DeletedBeforeWrite {
        inner: Arc<InMemoryStore>,
    }

    #[async_trait::async_trait]
    impl VectorStore for DeletedBeforeWrite {
        fn id(&self) -> &str {
            "deleted-before-write"
        }

        async fn nearest_active(
            &self,
            user_id: &str,
            embedding: &[f32],
            max_distance: f64,
            filter: &SearchFilter,
            limit: usize,
        ) -> Result<Vec<ScoredMemory>> {
            self.inner
                .nearest_active(user_id, embedding, max_distance, filter, limit)
                .await
        }

        async fn write(&self, batch: &WriteBatch) -> Result<()> {
            if let Some(candidate) = batch.supersedes {
                self.inner
                    .transition_state(&batch.memory.user_id, candidate, MemoryState::Deleted)
                    .await?;
            }
            self.inner.write(batch).await
        }

        async fn transition_state(&self, user_id: &str, id: Uuid, to: MemoryState) -> Result<bool> {
            self.inner.transition_state(user_id, id, to).await
        }

        async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Memory>> {
            self.inner.get(user_id, id).await
        }

        async fn chain(&self, user_id: &str, root_id: Uuid) -> Result<Vec<Memory>> {
            self.inner.chain(user_id, root_id).await
        }

        async fn relations(&self, user_id: &str, id: Uuid) -> Result<Vec<MemoryRelation>> {
            self.inner.relations(user_id, id).await
        }

        async fn health_check(&self) -> Result<bool> {
            self.inner.health_check().await
        }
    }

    #[tokio::test]
    async fn test_update_losing_race_is_conflict() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I switched to neovim", vec![0.1]);
        let inner = Arc::new(InMemoryStore::with_distance(quantized_distance));
        let background = Arc::new(BackgroundTasks::spawn(inner.clone(), 16));
        let engine = ConsolidationEngine::new(
            Arc::new(DeletedBeforeWrite { inner: inner.clone() }),
            inner.clone(),
            Arc::new(embedder),
            Arc::new(PassthroughExpander),
            Arc::new(ScriptedClassifier::answering(Relationship::Update)),
            background,
            EngineConfig::default(),
        );

        let first = engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        engine.flush().await;
        assert_eq!(engine.count("alice").await.unwrap(), 1);

        let err = engine
            .save("alice", SaveMemoryRequest::new("I switched to neovim"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let memories = inner.memories_for("alice").await;
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].id, first.id);
        assert_eq!(memories[0].state, MemoryState::Deleted);
        assert!(engine.relations("alice", first.id).await.unwrap().is_empty());

        engine.flush().await;
        assert_eq!(engine.count("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleted_memory_is_not_a_candidate() {
        let embedder = ScriptedEmbedder::new(1)
            .with("I use vim", vec![0.0])
            .with("I use neovim", vec![0.1]);
        let classifier = Arc::new(ScriptedClassifier::answering(Relationship::Update));
        let h = harness(embedder, classifier.clone(), Arc::new(PassthroughExpander));

        let first = h.engine.save("alice", SaveMemoryRequest::new("I use vim")).await.unwrap();
        h.engine.delete("alice", first.id).await.unwrap();

        let second = h.engine.save("alice", SaveMemoryRequest::new("I use neovim")).await.unwrap();
        assert_eq!(second.status, SaveStatus::Saved);
        assert_eq!(classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_one_active_per_chain() {
        let mut embedder = ScriptedEmbedder::new(1).with("base", vec![0.0]);
        for i in 0..8 {
            embedder = embedder.with(&format!("update {}", i), vec![0.01 * (i + 1) as f32]);
        }
        let h = with_verdict(embedder, Relationship::Update);
        let base = h.engine.save("alice", SaveMemoryRequest::new("base")).await.unwrap();

        let saves = (0..8).map(|i| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .save("alice", SaveMemoryRequest::new(format!("update {}", i)))
                    .await
            })
        });
        for result in futures::future::join_all(saves).await {
            assert_eq!(result.unwrap().unwrap().status, SaveStatus::Updated);
        }

        let chain = h.engine.history("alice", base.id).await.unwrap();
        assert_eq!(chain.len(), 9);
        let versions: Vec<i32> = chain.iter().map(|m| m.version).collect();
        assert_eq!(versions, (1..=9).collect::<Vec<_>>());
        assert_eq!(
            chain.iter().filter(|m| m.state == MemoryState::Active).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let h = with_verdict(ScriptedEmbedder::new(1), Relationship::Similar);

        let empty = h.engine.save("alice", SaveMemoryRequest::new("   ")).await;
        assert!(matches!(empty, Err(Error::InvalidInput(_))));

        let huge = h
            .engine
            .save("alice", SaveMemoryRequest::new("x".repeat(10_001)))
            .await;
        assert!(matches!(huge, Err(Error::InvalidInput(_))));

        let anonymous = h.engine.save("", SaveMemoryRequest::new("I use vim")).await;
        assert!(matches!(anonymous, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_history_of_unknown_id_is_empty() {
        let h = with_verdict(ScriptedEmbedder::new(1), Relationship::Similar);
        assert!(h.engine.history("alice", Uuid::new_v4()).await.unwrap().is_empty());
    }
}
