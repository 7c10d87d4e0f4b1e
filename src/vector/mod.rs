//! Document vector indexing and nearest-neighbor retrieval.
//!
//! Documents are chunked, each chunk embedded, and the chunk vectors
//! mean-pooled into one L2-normalized vector per document. Vectors live in a
//! flat exact index whose positions line up with a metadata store; both are
//! persisted together and searched by Euclidean distance.

pub mod aggregator;
pub mod chunker;
pub mod corpus;
pub mod index;
pub mod indexer;
pub mod metadata;
pub mod models;
pub mod persistence;
pub mod search;
pub mod source;
pub mod vectorizer;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use std::sync::Arc;

pub use aggregator::DocumentAggregator;
pub use chunker::Chunker;
pub use corpus::CorpusIndex;
pub use index::{Neighbor, VectorIndex};
pub use indexer::{BuildReport, DocumentIndexer, SkipReason, SkippedDocument};
pub use metadata::MetadataStore;
pub use models::{DocumentRecord, IndexEntry, MetadataRecord, RawDocument, SearchResult};
pub use persistence::{IndexManifest, IndexStore};
pub use search::DocumentSearch;
pub use vectorizer::Vectorizer;

/// Wire a chunker and embedding provider into an aggregator.
pub fn document_aggregator(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<DocumentAggregator> {
    let chunker = Chunker::new(&config.chunking)?;
    Ok(DocumentAggregator::new(Vectorizer::new(chunker, provider)))
}

/// Indexer writing to the configured index directory.
pub fn document_indexer(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<DocumentIndexer> {
    let aggregator = document_aggregator(config, provider)?;
    Ok(DocumentIndexer::new(
        aggregator,
        IndexStore::new(&config.index.directory),
        config.embedding.concurrency,
    ))
}

/// Load the persisted corpus and open it for queries.
///
/// Fails with `NotFound` when no index has been built in the configured
/// directory yet.
pub async fn initialize_document_search(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<DocumentSearch>> {
    let store = IndexStore::new(&config.index.directory);
    let corpus = store.load_required(provider.dimension()).await?;

    let aggregator = document_aggregator(config, provider)?;
    let search = DocumentSearch::new(corpus, aggregator, config.embedding.query_cache_capacity)?;
    Ok(Arc::new(search))
}
