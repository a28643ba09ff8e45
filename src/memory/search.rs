//! Search engine
//!
//! Embeds the query and returns the user's closest Active memories.

use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::core::provider::EmbeddingProvider;
use crate::core::storage::VectorStore;
use crate::core::types::{SearchHit, SearchMemoryRequest, SearchMemoryResponse};
use crate::error::Result;

use super::consolidation::validate_user;
use super::embedding::embed_within;

/// Answers semantic queries over current memories
#[derive(Clone)]
pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: EngineConfig,
}

impl SearchEngine {
    /// Create a new search engine
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Self {
        SearchEngine {
            store,
            embedder,
            config,
        }
    }

    /// Active memories of `user_id` closest to the query, most relevant first
    pub async fn search(&self, user_id: &str, request: SearchMemoryRequest) -> Result<SearchMemoryResponse> {
        validate_user(user_id)?;
        request.validate()?;

        let limit = request.limit.unwrap_or(self.config.default_search_limit);
        let embedding = embed_within(self.embedder.as_ref(), &request.query, self.config.embed_timeout).await?;

        let scored = self
            .store
            .nearest_active(
                user_id,
                &embedding,
                self.config.search_threshold,
                &request.filter(),
                limit,
            )
            .await?;

        debug!("Search for user={} matched {} memories", user_id, scored.len());

        let memories: Vec<SearchHit> = scored.into_iter().map(SearchHit::from).collect();
        Ok(SearchMemoryResponse {
            found: memories.len(),
            memories,
        })
    }
}
