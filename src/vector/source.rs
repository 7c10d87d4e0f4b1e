//! Document source: arXiv record exports on disk.

use crate::error::{Error, Result};
use crate::vector::models::RawDocument;
use std::path::Path;

/// Read a JSON array of paper records.
///
/// Fields are left optional so incomplete records reach the build pipeline
/// and are reported as skips there. Summaries have their line wraps folded
/// into single spaces.
pub async fn read_records(path: &Path) -> Result<Vec<RawDocument>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::io(path, error)
        }
    })?;

    let documents = parse_records(&raw)?;
    tracing::debug!(path = %path.display(), count = documents.len(), "read document records");
    Ok(documents)
}

/// Parse records from an in-memory JSON array.
pub fn parse_records(raw: &str) -> Result<Vec<RawDocument>> {
    let mut documents: Vec<RawDocument> = serde_json::from_str(raw)?;
    for document in &mut documents {
        if let Some(summary) = document.summary.as_mut() {
            *summary = collapse_whitespace(summary);
        }
        if let Some(title) = document.title.as_mut() {
            *title = collapse_whitespace(title);
        }
    }
    Ok(documents)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
