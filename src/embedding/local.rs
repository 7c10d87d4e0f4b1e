//! Embedding generation via fastembed.

use super::EmbeddingProvider;
use crate::error::{EmbeddingError, Result};
use std::path::Path;
use std::sync::Arc;

const DIMENSION_PROBE: &str = "dimension probe";

/// Fastembed sentence-embedding model shared across tasks.
///
/// fastembed's TextEmbedding is blocking ONNX inference, so it sits behind an
/// Arc and every call goes through spawn_blocking.
pub struct FastEmbedProvider {
    model: Arc<fastembed::TextEmbedding>,
    model_id: String,
    dimension: usize,
    batch_size: Option<usize>,
}

impl FastEmbedProvider {
    /// Load `model_name`, storing downloaded model files in `cache_dir`.
    ///
    /// The output dimension is probed once here and fixed afterwards.
    pub fn new(model_name: &str, cache_dir: &Path, batch_size: Option<usize>) -> Result<Self> {
        let options = fastembed::InitOptions::new(parse_model(model_name)?)
            .with_cache_dir(cache_dir.to_path_buf())
            .with_show_download_progress(true);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let probe = model
            .embed(vec![DIMENSION_PROBE], None)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;
        let dimension = probe.first().map(Vec::len).unwrap_or_default();
        if dimension == 0 {
            return Err(EmbeddingError::InitFailed(format!(
                "model {model_name} produced an empty probe embedding"
            ))
            .into());
        }

        tracing::info!(model = model_name, dimension, "embedding model loaded");

        Ok(Self {
            model: Arc::new(model),
            model_id: model_name.to_string(),
            dimension,
            batch_size,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || {
            model
                .embed(texts, batch_size)
                .map_err(|e| crate::Error::from(EmbeddingError::EmbeddingFailed(e.to_string())))
        })
        .await
        .map_err(|e| crate::Error::Other(anyhow::anyhow!("embedding task failed: {}", e)))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Resolve a configured model name to a fastembed model.
fn parse_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    let normalized = name
        .trim()
        .trim_start_matches("sentence-transformers/")
        .trim_start_matches("BAAI/")
        .to_lowercase();

    match normalized.as_str() {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        _ => Err(EmbeddingError::UnknownModel(name.to_string()).into()),
    }
}
