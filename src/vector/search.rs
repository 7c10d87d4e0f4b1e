//! Query API: embed the query, search the corpus, join with metadata.

use crate::error::{Error, Result};
use crate::vector::aggregator::DocumentAggregator;
use crate::vector::corpus::CorpusIndex;
use crate::vector::models::SearchResult;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Nearest-neighbor search over one corpus snapshot at a time.
///
/// The corpus can be replaced with [`replace_corpus`](Self::replace_corpus)
/// while queries run; each query sees a single immutable snapshot.
pub struct DocumentSearch {
    corpus: ArcSwap<CorpusIndex>,
    aggregator: DocumentAggregator,
    query_cache: Option<moka::sync::Cache<String, Arc<Vec<f32>>>>,
}

impl DocumentSearch {
    /// `query_cache_capacity` of 0 disables query embedding caching.
    pub fn new(
        corpus: CorpusIndex,
        aggregator: DocumentAggregator,
        query_cache_capacity: u64,
    ) -> Result<Self> {
        let dimension = aggregator.vectorizer().dimension();
        if corpus.dimension() != dimension {
            return Err(Error::InvalidInput(format!(
                "corpus dimension {} does not match embedding dimension {}",
                corpus.dimension(),
                dimension
            )));
        }

        let query_cache = (query_cache_capacity > 0)
            .then(|| moka::sync::Cache::new(query_cache_capacity));

        Ok(Self {
            corpus: ArcSwap::from_pointee(corpus),
            aggregator,
            query_cache,
        })
    }

    /// Current corpus snapshot.
    pub fn corpus(&self) -> Arc<CorpusIndex> {
        self.corpus.load_full()
    }

    /// Install a rebuilt or reloaded corpus.
    pub fn replace_corpus(&self, corpus: CorpusIndex) -> Result<()> {
        let dimension = self.aggregator.vectorizer().dimension();
        if corpus.dimension() != dimension {
            return Err(Error::InvalidInput(format!(
                "corpus dimension {} does not match embedding dimension {}",
                corpus.dimension(),
                dimension
            )));
        }
        tracing::debug!(count = corpus.len(), "replacing searchable corpus");
        self.corpus.store(Arc::new(corpus));
        Ok(())
    }

    /// Rank the `k` documents closest to `text`.
    ///
    /// The query is embedded whole, without chunking.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }

        let embedding = self.embed_query(trimmed).await?;
        let corpus = self.corpus.load();
        let results = corpus.search(&embedding, k)?;

        tracing::debug!(k, returned = results.len(), "query complete");
        Ok(results)
    }

    /// Rank the `k` documents closest to a long text such as a paper
    /// abstract. The text is chunked and mean-pooled like an indexed
    /// document before searching.
    pub async fn similar(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("text must not be empty".to_string()));
        }

        let pooled = self.aggregator.pool_text(text).await?;
        let corpus = self.corpus.load();
        corpus.search(&pooled, k)
    }

    async fn embed_query(&self, text: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(cached) = self
            .query_cache
            .as_ref()
            .and_then(|cache| cache.get(text))
        {
            tracing::trace!("query embedding cache hit");
            return Ok(cached);
        }

        let mut rows = self
            .aggregator
            .vectorizer()
            .embed(vec![text.to_string()])
            .await?;
        let embedding = Arc::new(rows.pop().unwrap_or_default());

        if let Some(cache) = &self.query_cache {
            cache.insert(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}
