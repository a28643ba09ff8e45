//! In-process caching for query embeddings
//!
//! Uses moka async cache (Send + Sync, TTL-based eviction).
//! No external services required.

use async_trait::async_trait;
use moka::future::Cache;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::provider::EmbeddingProvider;
use crate::error::Result;

/// How long a cached embedding stays valid
const EMBEDDING_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache key helper: hash a string to u64
fn hash_key(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Embedding provider decorator that remembers recent results
///
/// Failures are never cached.
#[derive(Clone)]
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    embeddings: Cache<u64, Vec<f32>>,
}

impl CachedEmbedder {
    /// Wrap `inner` with a cache of at most `capacity` embeddings
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: u64) -> Self {
        CachedEmbedder {
            inner,
            embeddings: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(EMBEDDING_TTL)
                .build(),
        }
    }

    /// Number of cached embeddings
    pub fn entry_count(&self) -> u64 {
        self.embeddings.entry_count()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = hash_key(text);
        if let Some(cached) = self.embeddings.get(&key).await {
            debug!("Embedding cache hit");
            return Ok(cached);
        }

        let embedding = self.inner.embed(text).await?;
        self.embeddings.insert(key, embedding.clone()).await;
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::testing::ScriptedEmbedder;

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let inner = Arc::new(ScriptedEmbedder::new(3).with("hello", vec![0.1, 0.2, 0.3]));
        let cached = CachedEmbedder::new(inner.clone(), 10);

        let first = cached.embed("hello").await.unwrap();
        let second = cached.embed("hello").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls(), 1);
        assert_eq!(cached.dimensions(), 3);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let inner = Arc::new(ScriptedEmbedder::new(3));
        let cached = CachedEmbedder::new(inner.clone(), 10);

        assert!(cached.embed("missing").await.is_err());
        assert!(cached.embed("missing").await.is_err());
        assert_eq!(inner.calls(), 2);
    }
}
