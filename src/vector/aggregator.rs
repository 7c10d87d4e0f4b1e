//! Reduces a document's chunk vectors to one representative vector.

use crate::error::{Error, Result};
use crate::vector::models::{DocumentRecord, IndexEntry};
use crate::vector::vectorizer::Vectorizer;

/// Chunks, embeds, and mean-pools documents.
#[derive(Clone)]
pub struct DocumentAggregator {
    vectorizer: Vectorizer,
}

impl DocumentAggregator {
    pub fn new(vectorizer: Vectorizer) -> Self {
        Self { vectorizer }
    }

    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    /// Build the index entry for `document`: title then summary, chunked,
    /// embedded, and averaged across chunks. The result is not normalized.
    pub async fn aggregate(&self, document: &DocumentRecord) -> Result<IndexEntry> {
        let vector = self.pool_text(&document.embedding_text()).await?;
        Ok(IndexEntry {
            vector,
            metadata: document.metadata(),
        })
    }

    /// Mean-pool the chunk vectors of an arbitrary text.
    pub async fn pool_text(&self, text: &str) -> Result<Vec<f32>> {
        let chunk_vectors = self.vectorizer.vectorize_text(text).await?;
        mean_pool(&chunk_vectors)
            .ok_or_else(|| Error::InvalidInput("text produced no chunk vectors".to_string()))
    }
}

/// Per-dimension arithmetic mean of `vectors`, unweighted by chunk length.
///
/// Returns `None` for an empty slice. All vectors must share one length.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = vec![0.0_f32; first.len()];
    for vector in vectors {
        for (total, value) in sum.iter_mut().zip(vector) {
            *total += value;
        }
    }

    let count = vectors.len() as f32;
    for total in &mut sum {
        *total /= count;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::embedding::HashedEmbeddingProvider;
    use crate::vector::chunker::Chunker;
    use std::sync::Arc;

    #[test]
    fn mean_pool_averages_each_dimension() {
        let pooled = mean_pool(&[vec![1.0, 0.0, 3.0], vec![0.0, 1.0, 1.0]]).expect("pooled");
        assert_eq!(pooled, vec![0.5, 0.5, 2.0]);
    }

    #[test]
    fn mean_pool_of_single_vector_is_identity() {
        assert_eq!(mean_pool(&[vec![0.25, -4.0]]), Some(vec![0.25, -4.0]));
        assert_eq!(mean_pool(&[]), None);
    }

    #[tokio::test]
    async fn aggregate_pools_all_chunks_and_attaches_metadata() {
        let provider = Arc::new(HashedEmbeddingProvider::new(16));
        let chunker = Chunker::new(&ChunkingConfig {
            chunk_size: 24,
            overlap: 4,
            ..ChunkingConfig::default()
        })
        .expect("chunker");
        let vectorizer = Vectorizer::new(chunker.clone(), provider.clone());
        let aggregator = DocumentAggregator::new(vectorizer);

        let document = DocumentRecord::new(
            "2005.14165",
            "Language Models are Few-Shot Learners",
            "http://arxiv.org/pdf/2005.14165",
            "Recent work has demonstrated substantial gains on many NLP tasks.",
        )
        .expect("document");

        let entry = aggregator.aggregate(&document).await.expect("aggregate");
        assert_eq!(entry.metadata.title, "Language Models are Few-Shot Learners");
        assert_eq!(entry.metadata.url, "http://arxiv.org/pdf/2005.14165");

        let text = document.embedding_text();
        let expected_rows: Vec<Vec<f32>> = chunker
            .chunks(&text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| provider.embed_text(chunk))
            .collect();
        assert!(expected_rows.len() > 1);
        assert_eq!(entry.vector, mean_pool(&expected_rows).expect("pooled"));
    }
}
