//! Deterministic feature-hashing embedder.
//!
//! Lowercased word tokens are hashed into signed buckets. Texts sharing words
//! land near each other, which is enough for offline runs and tests without a
//! model download. Text with no word characters embeds to the zero vector.

use super::EmbeddingProvider;
use crate::error::Result;
use sha2::{Digest, Sha256};

pub struct HashedEmbeddingProvider {
    dimension: usize,
    model_id: String,
}

impl HashedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: format!("hashed-{dimension}"),
        }
    }

    /// Embed a single text (pure, synchronous).
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_case_insensitive() {
        let provider = HashedEmbeddingProvider::new(64);
        let first = provider.embed_text("Attention is all you need");
        let second = provider.embed_text("attention IS all you NEED");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.iter().any(|value| *value != 0.0));
    }

    #[test]
    fn text_without_words_is_zero() {
        let provider = HashedEmbeddingProvider::new(16);
        assert!(provider.embed_text("  ...  ").iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn embed_preserves_input_order() {
        let provider = HashedEmbeddingProvider::new(32);
        let texts = vec!["graph neural networks".to_string(), "protein folding".to_string()];
        let vectors = provider.embed(texts.clone()).await.expect("embed");
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], provider.embed_text(&texts[0]));
        assert_eq!(vectors[1], provider.embed_text(&texts[1]));
    }
}
