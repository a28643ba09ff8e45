//! Scripted providers for engine tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::provider::{EmbeddingProvider, RelationshipClassifier, TextExpander};
use crate::core::types::Relationship;
use crate::error::{Error, Result};

/// One-dimensional distance rounded to four decimals
///
/// Lets tests place memories at exact distances such as 0.3.
pub fn quantized_distance(a: &[f32], b: &[f32]) -> f64 {
    match (a.first(), b.first()) {
        (Some(x), Some(y)) => ((*x as f64 - *y as f64).abs() * 10_000.0).round() / 10_000.0,
        _ => 2.0,
    }
}

/// Embedder that answers from a fixed table
pub struct ScriptedEmbedder {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        ScriptedEmbedder {
            dimensions,
            vectors: HashMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| Error::Provider(format!("no embedding scripted for {:?}", text)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Classifier with a fixed answer, a failure, or a delay
pub struct ScriptedClassifier {
    verdict: Option<Relationship>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn answering(verdict: Relationship) -> Self {
        ScriptedClassifier {
            verdict: Some(verdict),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        ScriptedClassifier {
            verdict: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationshipClassifier for ScriptedClassifier {
    async fn classify(&self, _existing_text: &str, _new_text: &str) -> Result<Relationship> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.verdict
            .ok_or_else(|| Error::Provider("classifier unavailable".into()))
    }
}

/// Expander that always fails
pub struct FailingExpander;

#[async_trait]
impl TextExpander for FailingExpander {
    async fn expand(&self, _text: &str) -> Result<String> {
        Err(Error::Provider("expander unavailable".into()))
    }
}

/// Expander that appends a fixed suffix
pub struct SuffixExpander(pub &'static str);

#[async_trait]
impl TextExpander for SuffixExpander {
    async fn expand(&self, text: &str) -> Result<String> {
        Ok(format!("{}{}", text, self.0))
    }
}
