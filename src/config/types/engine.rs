//! Engine configuration types
//!
//! Thresholds, limits, and timeouts for the consolidation and search engines.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::types::{DEFAULT_SEARCH_LIMIT, SEARCH_THRESHOLD, SIMILARITY_THRESHOLD};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum cosine distance (exclusive) for consolidation candidates
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Maximum cosine distance (exclusive) for search results
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f64,
    /// Result count when the caller does not ask for one
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,
    /// Timeout for the embedding model
    #[serde(with = "humantime_serde", default = "default_embed_timeout")]
    pub embed_timeout: Duration,
    /// Timeout for text expansion
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub expand_timeout: Duration,
    /// Timeout for relationship classification
    #[serde(with = "humantime_serde", default = "default_llm_timeout")]
    pub classify_timeout: Duration,
    /// Capacity of the background side-effect queue
    #[serde(default = "default_queue_capacity")]
    pub background_queue_capacity: usize,
    /// How long an idle per-user lock is kept
    #[serde(with = "humantime_serde", default = "default_lock_idle")]
    pub user_lock_idle: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            similarity_threshold: default_similarity_threshold(),
            search_threshold: default_search_threshold(),
            default_search_limit: default_search_limit(),
            embed_timeout: default_embed_timeout(),
            expand_timeout: default_llm_timeout(),
            classify_timeout: default_llm_timeout(),
            background_queue_capacity: default_queue_capacity(),
            user_lock_idle: default_lock_idle(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    SIMILARITY_THRESHOLD
}

fn default_search_threshold() -> f64 {
    SEARCH_THRESHOLD
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_embed_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_llm_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_queue_capacity() -> usize {
    256
}

fn default_lock_idle() -> Duration {
    Duration::from_secs(10 * 60)
}
