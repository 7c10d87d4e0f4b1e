//! Chunk-to-vector driver over an embedding provider.

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::vector::chunker::Chunker;
use std::sync::Arc;

/// Produces one embedding per chunk. Does not normalize.
#[derive(Clone)]
pub struct Vectorizer {
    chunker: Chunker,
    provider: Arc<dyn EmbeddingProvider>,
}

impl Vectorizer {
    pub fn new(chunker: Chunker, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { chunker, provider }
    }

    /// Embedding dimension `D` of the underlying provider.
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Embed `texts`, returning a `texts.len() × D` matrix as rows.
    ///
    /// The provider's output is checked against its contract: one row per
    /// input, each of length `D`.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(Error::InvalidInput(
                "cannot vectorize an empty list of texts".to_string(),
            ));
        }

        let expected_rows = texts.len();
        let dimension = self.provider.dimension();
        let rows = self.provider.embed(texts).await?;

        if rows.len() != expected_rows {
            return Err(Error::InconsistentState(format!(
                "embedding provider {} returned {} vectors for {} inputs",
                self.provider.model_id(),
                rows.len(),
                expected_rows
            )));
        }
        if let Some((row, vector)) = rows
            .iter()
            .enumerate()
            .find(|(_, vector)| vector.len() != dimension)
        {
            return Err(Error::InconsistentState(format!(
                "embedding provider {} returned a {}-dimensional vector for input {} (expected {})",
                self.provider.model_id(),
                vector.len(),
                row,
                dimension
            )));
        }

        Ok(rows)
    }

    /// Chunk `text` and embed every non-blank chunk.
    pub async fn vectorize_text(&self, text: &str) -> Result<Vec<Vec<f32>>> {
        let chunks: Vec<String> = self
            .chunker
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_string)
            .collect();

        tracing::trace!(chunks = chunks.len(), chars = text.len(), "chunked text");

        self.embed(chunks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::embedding::HashedEmbeddingProvider;

    /// Provider that breaks its own contract in a configurable way.
    struct Misbehaving {
        drop_rows: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for Misbehaving {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            if self.drop_rows {
                Ok(vec![vec![1.0, 0.0]])
            } else {
                Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "misbehaving"
        }
    }

    fn vectorizer(provider: Arc<dyn EmbeddingProvider>, chunk_size: usize) -> Vectorizer {
        let chunker = Chunker::new(&ChunkingConfig {
            chunk_size,
            overlap: 2,
            ..ChunkingConfig::default()
        })
        .expect("chunker");
        Vectorizer::new(chunker, provider)
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let vectorizer = vectorizer(Arc::new(HashedEmbeddingProvider::new(8)), 32);
        let result = vectorizer.embed(Vec::new()).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = vectorizer.vectorize_text("   \n\n  ").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn one_row_per_chunk() {
        let vectorizer = vectorizer(Arc::new(HashedEmbeddingProvider::new(8)), 16);
        let rows = vectorizer
            .vectorize_text("neural machine translation by jointly learning to align")
            .await
            .expect("vectorize");
        assert!(rows.len() > 1);
        assert!(rows.iter().all(|row| row.len() == 8));
    }

    #[tokio::test]
    async fn provider_contract_violations_are_inconsistent_state() {
        let short = vectorizer(Arc::new(Misbehaving { drop_rows: true }), 32);
        let result = short.embed(vec!["a".into(), "b".into()]).await;
        assert!(matches!(result, Err(Error::InconsistentState(_))));

        let wide = vectorizer(Arc::new(Misbehaving { drop_rows: false }), 32);
        let result = wide.embed(vec!["a".into()]).await;
        assert!(matches!(result, Err(Error::InconsistentState(_))));
    }
}
