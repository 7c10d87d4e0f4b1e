//! Embedding adapters: text in, fixed-dimension vectors out.
//!
//! The pipeline only sees the [`EmbeddingProvider`] capability, so the index
//! and aggregator can run against a deterministic stub instead of a model.

pub mod hashed;
pub mod local;

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::error::Result;
use std::sync::Arc;

pub use hashed::HashedEmbeddingProvider;
pub use local::FastEmbedProvider;

/// Maps text to embedding vectors.
///
/// Implementations return exactly one vector per input, in input order, and
/// every vector has length [`dimension`](Self::dimension) for the lifetime of
/// the provider.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Output dimension `D`.
    fn dimension(&self) -> usize;

    /// Identifier recorded alongside persisted artifacts.
    fn model_id(&self) -> &str;
}

/// Build the provider selected by configuration.
///
/// Fastembed construction downloads and loads the model, so this blocks; call
/// it before serving queries.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Fastembed => {
            let provider =
                FastEmbedProvider::new(&config.model, &config.cache_dir, config.batch_size)?;
            Ok(Arc::new(provider))
        }
        EmbeddingProviderKind::Hashed => {
            Ok(Arc::new(HashedEmbeddingProvider::new(config.dimension)))
        }
    }
}
