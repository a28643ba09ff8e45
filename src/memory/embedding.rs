//! Local embedding generation via fastembed
//!
//! Defaults to the multilingual-e5-small model (384 dimensions, ~90MB),
//! which covers 100+ languages. The model auto-downloads on first use.

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::core::provider::EmbeddingProvider;
use crate::error::{Error, Result};

/// Resolve a configured model name to a fastembed model and its dimensions
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    match name.trim().to_lowercase().as_str() {
        "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            Ok((EmbeddingModel::MultilingualE5Small, 384))
        }
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        other => Err(Error::Config(format!(
            "Unsupported embedding model: {}. Valid options: multilingual-e5-small, all-minilm-l6-v2, bge-small-en-v1.5",
            other
        ))),
    }
}

/// Local embedding service wrapping fastembed
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<TextEmbedding>,
    dimensions: usize,
}

impl EmbeddingService {
    /// Load the configured model
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_kind, dimensions) = resolve_model(&config.model)?;
        if dimensions != config.dimensions as usize {
            return Err(Error::Config(format!(
                "Embedding model {} produces {} dimensions, config says {}",
                config.model, dimensions, config.dimensions
            )));
        }

        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| Error::Provider(format!("Failed to init embedding model: {}", e)))?;

        info!("Embedding model loaded: {} ({} dims)", config.model, dimensions);

        Ok(EmbeddingService {
            model: Arc::new(model),
            dimensions,
        })
    }

}

#[async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| Error::Provider(format!("Embedding error: {}", e)))?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| Error::Provider("No embedding returned".into()))
        })
        .await
        .map_err(|e| Error::Internal(format!("Embedding task join error: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embed `text` within `limit`, checking the vector length
///
/// A timeout becomes `Error::Timeout`; provider failures pass through.
pub async fn embed_within(
    embedder: &dyn EmbeddingProvider,
    text: &str,
    limit: Duration,
) -> Result<Vec<f32>> {
    let embedding = tokio::time::timeout(limit, embedder.embed(text))
        .await
        .map_err(|_| Error::Timeout(format!("embedding did not finish within {:?}", limit)))??;

    if embedding.len() != embedder.dimensions() {
        return Err(Error::Provider(format!(
            "embedding has {} dimensions, expected {}",
            embedding.len(),
            embedder.dimensions()
        )));
    }

    Ok(embedding)
}
