//! Application context
//!
//! Built once at startup from a `Config`; owns the database pool, the
//! stores, the model providers, and the background worker. Call
//! `shutdown` before exiting so queued counter updates are not lost.

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{validate_config, Config, StorageBackendType};
use crate::core::provider::{
    EmbeddingProvider, FixedClassifier, PassthroughExpander, RelationshipClassifier, TextExpander,
};
use crate::core::storage::{CounterService, VectorStore};
use crate::database::{init_pool, InMemoryStore, PgCounterStore, PgMemoryStore, PostgresPool};
use crate::error::{Error, Result};
use crate::llm::OpenRouterClient;
use crate::memory::{
    BackgroundTasks, CachedEmbedder, ConsolidationEngine, EmbeddingService, LlmClassifier,
    LlmExpander, SearchEngine,
};

/// Handle to every long-lived component
pub struct AppContext {
    config: Config,
    pool: Option<PostgresPool>,
    store: Arc<dyn VectorStore>,
    background: Arc<BackgroundTasks>,
    consolidation: ConsolidationEngine,
    search: SearchEngine,
}

impl AppContext {
    /// Validate `config`, load the embedding model, and connect storage
    pub async fn init(config: Config) -> Result<Self> {
        let embedding_config = config.storage.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || EmbeddingService::new(&embedding_config))
            .await
            .map_err(|e| Error::Internal(format!("Embedding init task failed: {}", e)))??;

        Self::with_embedder(config, Arc::new(embedder)).await
    }

    /// Same as `init`, with a caller-supplied embedding provider
    pub async fn with_embedder(config: Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let validation = validate_config(&config);
        for warning in &validation.warnings {
            warn!("Config: {}", warning);
        }
        if let Some(error) = validation.first_error() {
            return Err(Error::Config(error));
        }

        let (pool, store, counter): (Option<PostgresPool>, Arc<dyn VectorStore>, Arc<dyn CounterService>) =
            match config.storage.backend {
                StorageBackendType::Postgres => {
                    let postgres = config
                        .storage
                        .postgres
                        .as_ref()
                        .ok_or_else(|| Error::Config("PostgreSQL not configured".into()))?;
                    let pool = init_pool(postgres).await?;
                    (
                        Some(pool.clone()),
                        Arc::new(PgMemoryStore::new(pool.clone())),
                        Arc::new(PgCounterStore::new(pool)),
                    )
                }
                StorageBackendType::Memory => {
                    let store = Arc::new(InMemoryStore::new());
                    (None, store.clone() as Arc<dyn VectorStore>, store as Arc<dyn CounterService>)
                }
            };

        let (expander, classifier): (Arc<dyn TextExpander>, Arc<dyn RelationshipClassifier>) =
            match config
                .provider
                .openrouter
                .clone()
                .filter(|o| !o.api_key.expose_secret().is_empty())
            {
                Some(openrouter) => {
                    let client = OpenRouterClient::new(openrouter)?;
                    (
                        Arc::new(LlmExpander::new(client.clone())),
                        Arc::new(LlmClassifier::new(client)),
                    )
                }
                None => {
                    warn!("OpenRouter not configured: expansion disabled, every match is treated as similar");
                    (Arc::new(PassthroughExpander), Arc::new(FixedClassifier::default()))
                }
            };

        let background = Arc::new(BackgroundTasks::spawn(
            counter.clone(),
            config.engine.background_queue_capacity,
        ));

        let consolidation = ConsolidationEngine::new(
            store.clone(),
            counter,
            embedder.clone(),
            expander,
            classifier,
            background.clone(),
            config.engine.clone(),
        );

        let query_embedder = Arc::new(CachedEmbedder::new(
            embedder,
            config.storage.embedding.cache_capacity,
        ));
        let search = SearchEngine::new(store.clone(), query_embedder, config.engine.clone());

        info!("Memoria ready (storage: {})", store.id());

        Ok(AppContext {
            config,
            pool,
            store,
            background,
            consolidation,
            search,
        })
    }

    /// Configuration the context was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Save, delete, and chain lookups
    pub fn consolidation(&self) -> &ConsolidationEngine {
        &self.consolidation
    }

    /// Semantic search
    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    /// Database pool, when backed by PostgreSQL
    pub fn pool(&self) -> Option<&PostgresPool> {
        self.pool.as_ref()
    }

    /// Whether the store answers
    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }

    /// Drain background work and close connections
    pub async fn shutdown(self) {
        self.background.shutdown().await;
        if let Some(pool) = self.pool {
            pool.close().await;
        }
        info!("Memoria shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SaveMemoryRequest, SaveStatus, SearchMemoryRequest};
    use crate::memory::testing::ScriptedEmbedder;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.backend = StorageBackendType::Memory;
        config.storage.embedding.dimensions = 2;
        config
    }

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let embedder = ScriptedEmbedder::new(2)
            .with("I use vim", vec![1.0, 0.0])
            .with("which editor", vec![0.9, 0.1]);
        let context = AppContext::with_embedder(memory_config(), Arc::new(embedder))
            .await
            .unwrap();

        assert!(context.pool().is_none());
        assert!(context.health_check().await.unwrap());

        let saved = context
            .consolidation()
            .save("alice", SaveMemoryRequest::new("I use vim"))
            .await
            .unwrap();
        assert_eq!(saved.status, SaveStatus::Saved);

        let found = context
            .search()
            .search("alice", SearchMemoryRequest::new("which editor"))
            .await
            .unwrap();
        assert_eq!(found.found, 1);
        assert_eq!(found.memories[0].id, saved.id);

        context.consolidation().flush().await;
        assert_eq!(context.consolidation().count("alice").await.unwrap(), 1);

        context.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = memory_config();
        config.engine.background_queue_capacity = 0;

        let result = AppContext::with_embedder(config, Arc::new(ScriptedEmbedder::new(2))).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
