//! Provider traits - Abstract interfaces for the models the engines call
//!
//! This module defines the three model-backed collaborators:
//! - `EmbeddingProvider`: text to fixed-length vector
//! - `TextExpander`: best-effort rewrite of a statement into a search-friendly form
//! - `RelationshipClassifier`: how a new statement relates to the closest prior one
//!
//! Expanders and classifiers return `Result` so implementations can report
//! what went wrong; the consolidation engine owns the fallback policy.

use async_trait::async_trait;

use super::types::Relationship;
use crate::error::Result;

/// Converts text into a dense vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;
}

/// Rewrites a short statement into a canonical, search-friendly form
#[async_trait]
pub trait TextExpander: Send + Sync {
    async fn expand(&self, text: &str) -> Result<String>;
}

/// Decides whether `new_text` updates, extends, or merely resembles `existing_text`
#[async_trait]
pub trait RelationshipClassifier: Send + Sync {
    async fn classify(&self, existing_text: &str, new_text: &str) -> Result<Relationship>;
}

/// Expander that returns its input unchanged
///
/// Used when no LLM provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExpander;

#[async_trait]
impl TextExpander for PassthroughExpander {
    async fn expand(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Classifier that always answers with the same verdict
///
/// With `Relationship::Similar` this never supersedes anything, which is the
/// safe behavior when no LLM provider is configured.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub Relationship);

impl Default for FixedClassifier {
    fn default() -> Self {
        FixedClassifier(Relationship::Similar)
    }
}

#[async_trait]
impl RelationshipClassifier for FixedClassifier {
    async fn classify(&self, _existing_text: &str, _new_text: &str) -> Result<Relationship> {
        Ok(self.0)
    }
}
