//! Index build pipeline: validate, chunk, embed, pool, store, persist.

use crate::error::{Error, Result};
use crate::vector::aggregator::DocumentAggregator;
use crate::vector::corpus::CorpusIndex;
use crate::vector::index::is_normalizable;
use crate::vector::models::{DocumentRecord, IndexEntry, RawDocument};
use crate::vector::persistence::IndexStore;
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;

/// Why a document was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// A required field is absent or blank.
    InvalidDocument(String),
    /// Chunking produced nothing to embed.
    NoChunks,
    /// Pooled vector has a zero or non-finite norm and cannot be normalized.
    DegenerateVector,
    EmbeddingFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InvalidDocument(detail) => write!(f, "invalid document: {detail}"),
            SkipReason::NoChunks => write!(f, "no chunks produced"),
            SkipReason::DegenerateVector => write!(f, "pooled vector cannot be normalized"),
            SkipReason::EmbeddingFailed(detail) => write!(f, "embedding failed: {detail}"),
        }
    }
}

/// A document that was not indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    /// Position in the input batch.
    pub position: usize,
    pub id: Option<String>,
    pub reason: SkipReason,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub total: usize,
    pub indexed: usize,
    pub skipped: Vec<SkippedDocument>,
    pub dimension: usize,
    /// Generation directory the artifacts were written to.
    pub location: PathBuf,
}

/// Builds a fresh corpus from a document batch and persists it.
pub struct DocumentIndexer {
    aggregator: DocumentAggregator,
    store: IndexStore,
    concurrency: usize,
}

impl DocumentIndexer {
    pub fn new(aggregator: DocumentAggregator, store: IndexStore, concurrency: usize) -> Self {
        Self {
            aggregator,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Build the index from `documents` and persist it.
    ///
    /// Per-document failures are logged, counted in the report, and do not
    /// stop the batch. Embedding runs concurrently but entries are appended in
    /// input order, so rebuilding the same batch is reproducible. When no
    /// document survives, `EmptyBuildResult` is returned and nothing on disk
    /// is touched.
    pub async fn build(&self, documents: Vec<RawDocument>) -> Result<(CorpusIndex, BuildReport)> {
        let total = documents.len();
        let mut skipped = Vec::new();
        let mut valid = Vec::with_capacity(total);

        for (position, raw) in documents.into_iter().enumerate() {
            let id = raw.id.clone();
            match DocumentRecord::try_from(raw) {
                Ok(document) => valid.push((position, document)),
                Err(error) => skipped.push(SkippedDocument {
                    position,
                    id,
                    reason: SkipReason::InvalidDocument(error.to_string()),
                }),
            }
        }

        let aggregator = &self.aggregator;
        let outcomes: Vec<(usize, DocumentRecord, Result<IndexEntry>)> =
            futures::stream::iter(valid)
                .map(|(position, document)| async move {
                    let outcome = aggregator.aggregate(&document).await;
                    (position, document, outcome)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut staged = Vec::with_capacity(outcomes.len());
        for (position, document, outcome) in outcomes {
            let reason = match outcome {
                Ok(entry) if is_normalizable(&entry.vector) => {
                    staged.push(entry);
                    continue;
                }
                Ok(_) => SkipReason::DegenerateVector,
                Err(error) if error.is_structural() => return Err(error),
                Err(Error::InvalidInput(_)) => SkipReason::NoChunks,
                Err(error) => SkipReason::EmbeddingFailed(error.to_string()),
            };
            skipped.push(SkippedDocument {
                position,
                id: Some(document.id().to_string()),
                reason,
            });
        }

        skipped.sort_by_key(|skip| skip.position);
        for skip in &skipped {
            tracing::warn!(
                position = skip.position,
                id = skip.id.as_deref().unwrap_or("<none>"),
                reason = %skip.reason,
                "skipping document"
            );
        }

        if staged.is_empty() {
            tracing::warn!(
                total,
                skipped = skipped.len(),
                "no documents produced vectors, leaving persisted index untouched"
            );
            return Err(Error::EmptyBuildResult {
                skipped: skipped.len(),
            });
        }

        let vectorizer = self.aggregator.vectorizer();
        let mut corpus = CorpusIndex::new(vectorizer.dimension(), vectorizer.provider().model_id());
        let indexed = staged.len();
        corpus.append(staged)?;

        let location = self.store.save(&corpus).await?;

        tracing::info!(
            total,
            indexed,
            skipped = skipped.len(),
            dimension = corpus.dimension(),
            "index build complete"
        );

        let report = BuildReport {
            total,
            indexed,
            skipped,
            dimension: corpus.dimension(),
            location,
        };
        Ok((corpus, report))
    }
}
