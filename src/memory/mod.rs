//! Memory module - consolidation, search, and the providers they call
//!
//! Orchestrates local embeddings (fastembed), in-process caching (moka),
//! LLM expansion and classification (OpenRouter), and the storage traits
//! from `core` into the two engines.

pub mod background;
pub mod cache;
pub mod classifier;
pub mod consolidation;
pub mod embedding;
pub mod expander;
pub mod locks;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use background::BackgroundTasks;
pub use cache::CachedEmbedder;
pub use classifier::LlmClassifier;
pub use consolidation::ConsolidationEngine;
pub use embedding::EmbeddingService;
pub use expander::LlmExpander;
pub use locks::UserLocks;
pub use search::SearchEngine;
