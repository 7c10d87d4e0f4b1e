//! Document records, index entries, and search results.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// An unvalidated document as supplied by a document source.
///
/// Field names accept both the arXiv export spelling (`PaperID`, `Title`,
/// `Summary`, `URL`) and the record-store spelling (`_id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, alias = "_id", alias = "PaperID", alias = "paper_id")]
    pub id: Option<String>,
    #[serde(default, alias = "Title")]
    pub title: Option<String>,
    #[serde(default, alias = "URL", alias = "Url")]
    pub url: Option<String>,
    #[serde(default, alias = "Summary", alias = "abstract")]
    pub summary: Option<String>,
}

/// A document ready for vectorization. All fields are present and non-blank.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    id: String,
    title: String,
    url: String,
    summary: String,
}

impl DocumentRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        summary: impl Into<String>,
    ) -> Result<Self> {
        let record = Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            summary: summary.into(),
        };

        for (name, value) in [
            ("id", &record.id),
            ("title", &record.title),
            ("url", &record.url),
            ("summary", &record.summary),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidInput(format!("document field `{name}` is empty")));
            }
        }

        Ok(record)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Title first, then summary. This is the text that gets chunked.
    pub fn embedding_text(&self) -> String {
        format!("{}\n\n{}", self.title.trim(), self.summary.trim())
    }

    /// Display metadata stored alongside the document's vector.
    pub fn metadata(&self) -> MetadataRecord {
        MetadataRecord {
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

impl TryFrom<RawDocument> for DocumentRecord {
    type Error = Error;

    fn try_from(raw: RawDocument) -> Result<Self> {
        let missing = [
            ("id", raw.id.is_none()),
            ("title", raw.title.is_none()),
            ("url", raw.url.is_none()),
            ("summary", raw.summary.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(Error::InvalidInput(format!(
                "document is missing required fields: {}",
                missing.join(", ")
            )));
        }

        DocumentRecord::new(
            raw.id.unwrap_or_default(),
            raw.title.unwrap_or_default(),
            raw.url.unwrap_or_default(),
            raw.summary.unwrap_or_default(),
        )
    }
}

/// Display metadata for one indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub url: String,
}

/// A document vector paired with its display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub metadata: MetadataRecord,
}

/// One ranked query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// 1-based rank.
    pub rank: usize,
    /// Squared L2 distance between unit vectors, in `[0, 4]`.
    pub distance: f32,
    pub title: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, title: &str, url: &str, summary: &str) -> RawDocument {
        RawDocument {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            summary: Some(summary.to_string()),
        }
    }

    #[test]
    fn valid_raw_document_converts() {
        let record = DocumentRecord::try_from(raw(
            "1706.03762v7",
            "Attention Is All You Need",
            "http://arxiv.org/pdf/1706.03762v7",
            "The dominant sequence transduction models...",
        ))
        .expect("valid document");

        assert_eq!(record.id(), "1706.03762v7");
        assert_eq!(
            record.embedding_text(),
            "Attention Is All You Need\n\nThe dominant sequence transduction models..."
        );
        assert_eq!(record.metadata().url, "http://arxiv.org/pdf/1706.03762v7");
    }

    #[test]
    fn missing_fields_are_named() {
        let error = DocumentRecord::try_from(RawDocument {
            id: Some("x".into()),
            title: Some("T".into()),
            ..RawDocument::default()
        })
        .expect_err("missing url and summary");

        let message = error.to_string();
        assert!(message.contains("url"));
        assert!(message.contains("summary"));
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(DocumentRecord::new("id", "   ", "u", "s").is_err());
        assert!(DocumentRecord::try_from(raw("id", "t", "u", "\n\t")).is_err());
    }

    #[test]
    fn deserializes_arxiv_and_store_spellings() {
        let arxiv: RawDocument = serde_json::from_str(
            r#"{"Title":"T","Summary":"S","URL":"http://arxiv.org/pdf/1","PaperID":"1"}"#,
        )
        .expect("arxiv record");
        assert_eq!(arxiv, raw("1", "T", "http://arxiv.org/pdf/1", "S"));

        let stored: RawDocument =
            serde_json::from_str(r#"{"_id":"2","Title":"T","Summary":"S"}"#).expect("store record");
        assert_eq!(stored.id.as_deref(), Some("2"));
        assert!(stored.url.is_none());
    }
}
