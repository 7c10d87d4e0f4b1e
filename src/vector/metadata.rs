//! Ordered display metadata, parallel to the vector index.

use crate::error::{Error, Result};
use crate::vector::models::MetadataRecord;

/// Append-only sequence where position `i` describes index vector `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Result<&MetadataRecord> {
        self.records.get(position).ok_or(Error::PositionOutOfRange {
            position,
            count: self.records.len(),
        })
    }

    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    pub(crate) fn extend(&mut self, records: impl IntoIterator<Item = MetadataRecord>) {
        self.records.extend(records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reports_out_of_range() {
        let store = MetadataStore::from_records(vec![MetadataRecord {
            title: "Deep Residual Learning".into(),
            url: "http://arxiv.org/pdf/1512.03385".into(),
        }]);

        assert_eq!(store.get(0).expect("in range").title, "Deep Residual Learning");
        assert!(matches!(
            store.get(1),
            Err(Error::PositionOutOfRange { position: 1, count: 1 })
        ));
    }
}
