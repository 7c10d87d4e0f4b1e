//! The vector index and metadata store, kept in lockstep.

use crate::error::{Error, Result};
use crate::vector::index::{Neighbor, VectorIndex};
use crate::vector::metadata::MetadataStore;
use crate::vector::models::{IndexEntry, MetadataRecord, SearchResult};

/// A searchable corpus. `index.len() == metadata.len()` at every point a
/// caller can observe.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusIndex {
    index: VectorIndex,
    metadata: MetadataStore,
    model_id: String,
}

impl CorpusIndex {
    pub fn new(dimension: usize, model_id: impl Into<String>) -> Self {
        Self {
            index: VectorIndex::new(dimension),
            metadata: MetadataStore::new(),
            model_id: model_id.into(),
        }
    }

    /// Pair a loaded index with its metadata, rejecting a count mismatch.
    pub(crate) fn from_parts(
        index: VectorIndex,
        metadata: MetadataStore,
        model_id: impl Into<String>,
    ) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(Error::InconsistentState(format!(
                "index holds {} vectors but metadata holds {} records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            model_id: model_id.into(),
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Append entries to both the index and the metadata store.
    ///
    /// Vectors are normalized and validated as a batch first; if that fails
    /// neither side changes.
    pub fn append(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let (mut vectors, records): (Vec<Vec<f32>>, Vec<MetadataRecord>) = entries
            .into_iter()
            .map(|entry| (entry.vector, entry.metadata))
            .unzip();

        self.index.add(&mut vectors)?;
        self.metadata.extend(records);

        if self.index.len() != self.metadata.len() {
            return Err(Error::InconsistentState(format!(
                "append left {} vectors and {} metadata records",
                self.index.len(),
                self.metadata.len()
            )));
        }
        Ok(())
    }

    /// Search with an already-embedded query and join hits with metadata.
    ///
    /// A hit whose position has no metadata means the two halves have
    /// drifted apart; that fails the whole query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let neighbors = self.index.search(query, k)?;
        neighbors
            .into_iter()
            .enumerate()
            .map(|(rank, Neighbor { position, distance })| {
                let record = self.metadata.get(position).map_err(|error| {
                    Error::InconsistentState(format!(
                        "search returned position {position} with no metadata: {error}"
                    ))
                })?;
                Ok(SearchResult {
                    rank: rank + 1,
                    distance,
                    title: record.title.clone(),
                    url: record.url.clone(),
                })
            })
            .collect()
    }
}
