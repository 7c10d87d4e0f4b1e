//! Error types for indexing, persistence, and retrieval.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty or malformed caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A zero-norm vector cannot be L2-normalized.
    #[error("degenerate vector at position {position}: norm is zero")]
    DegenerateVector { position: usize },

    #[error("position {position} is out of range for {count} entries")]
    PositionOutOfRange { position: usize, count: usize },

    /// A persisted artifact is absent.
    #[error("artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A persisted artifact violates an invariant on load.
    #[error("corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    /// Runtime desynchronization between the vector index and its metadata.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// A build pass produced nothing to index.
    #[error("build produced no index entries ({skipped} documents skipped)")]
    EmptyBuildResult { skipped: usize },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error means the index/metadata invariants can no longer
    /// be trusted. Structural errors abort the operation in progress instead
    /// of being recovered per document.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::DegenerateVector { .. }
                | Error::CorruptArtifact { .. }
                | Error::InconsistentState(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Embedding adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("failed to initialize embedding model: {0}")]
    InitFailed(String),

    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
}

/// Configuration errors, raised when a configuration value is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
