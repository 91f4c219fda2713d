// Embeddings module
// Capability seam over pluggable embedding backends plus the shipped
// local (hashing) and remote (Ollama-compatible) implementations

pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::config::{Config, EmbeddingBackendKind};

pub use hashing::HashEmbedder;
pub use ollama::OllamaEmbedder;

/// Maps a batch of texts to fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order, and must fail the whole batch rather than return partial results.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Construct the embedding backend selected by configuration.
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.backend {
        EmbeddingBackendKind::Hashing => Ok(Arc::new(HashEmbedder::new(
            config.embedding.dimension as usize,
        ))),
        EmbeddingBackendKind::Ollama => Ok(Arc::new(OllamaEmbedder::new(&config.embedding)?)),
    }
}
