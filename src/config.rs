//! Configuration for embedding, chunking, and index storage.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `PAPERDEX__SECTION__KEY` environment overrides. Every component receives
//! its section explicitly; nothing reads process-wide state after load.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "PAPERDEX";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
}

/// Which embedding adapter backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Local ONNX sentence-embedding model via fastembed.
    Fastembed,
    /// Deterministic feature-hashing embedder, no model download.
    Hashed,
}

/// Embedding adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Fastembed model name (e.g. `all-minilm-l6-v2`).
    pub model: String,
    /// Where downloaded model files are cached.
    pub cache_dir: PathBuf,
    /// Output dimension of the hashed provider. Fastembed models report their own.
    pub dimension: usize,
    /// Texts per model invocation. `None` uses the model default.
    pub batch_size: Option<usize>,
    /// Documents embedded concurrently during a build.
    pub concurrency: usize,
    /// Capacity of the query embedding cache. 0 disables it.
    pub query_cache_capacity: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Fastembed,
            model: "all-minilm-l6-v2".to_string(),
            cache_dir: default_data_dir().join("models"),
            dimension: 384,
            batch_size: None,
            concurrency: 4,
            query_cache_capacity: 256,
        }
    }
}

/// How the chunker chooses chunk boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkMode {
    /// Fixed-width character windows.
    Characters,
    /// Prefer cutting right after a separator token, never inside one.
    Separators,
}

/// Chunker settings. Sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    pub mode: ChunkMode,
    /// Separator tokens in priority order.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 128,
            overlap: 4,
            mode: ChunkMode::Separators,
            separators: vec!["\n\n".to_string(), "\n".to_string(), " ".to_string()],
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size must be greater than 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(invalid(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        if self.mode == ChunkMode::Separators && self.separators.iter().any(String::is_empty) {
            return Err(invalid("chunking.separators must not contain empty strings"));
        }
        Ok(())
    }
}

/// Index storage and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted index and metadata artifacts.
    pub directory: PathBuf,
    /// Number of results returned when the caller does not ask for a count.
    pub default_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            directory: default_data_dir().join("index"),
            default_limit: 5,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file, and the
    /// environment.
    ///
    /// When `path` is `None`, `<config_dir>/paperdex/config.toml` is used if
    /// it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Load(format!(
                        "config file not found: {}",
                        path.display()
                    ))
                    .into());
                }
                Some(path.to_path_buf())
            }
            None => default_config_file().filter(|candidate| candidate.exists()),
        };

        let mut builder = config::Config::builder();
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(file.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: Config = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component could work with.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.embedding.concurrency == 0 {
            return Err(invalid("embedding.concurrency must be at least 1"));
        }
        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension must be greater than 0"));
        }
        if self.embedding.batch_size == Some(0) {
            return Err(invalid("embedding.batch_size must be greater than 0"));
        }
        if self.index.default_limit == 0 {
            return Err(invalid("index.default_limit must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> crate::Error {
    ConfigError::Invalid(message.into()).into()
}

/// `<data_local_dir>/paperdex`, falling back to `./.paperdex`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("paperdex"))
        .unwrap_or_else(|| PathBuf::from(".paperdex"))
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paperdex").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("default config validates");
        assert_eq!(config.chunking.chunk_size, 128);
        assert_eq!(config.chunking.overlap, 4);
        assert_eq!(config.index.default_limit, 5);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Fastembed);
    }

    #[test]
    fn parses_partial_toml() {
        let config = Config::from_toml_str(
            r#"
[embedding]
provider = "hashed"
dimension = 64

[chunking]
chunk_size = 256
overlap = 16
mode = "characters"

[index]
directory = "/var/lib/paperdex"
"#,
        )
        .expect("parse config");

        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashed);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.chunking.chunk_size, 256);
        assert_eq!(config.chunking.mode, ChunkMode::Characters);
        assert_eq!(config.chunking.separators.len(), 3);
        assert_eq!(config.index.directory, PathBuf::from("/var/lib/paperdex"));
        assert_eq!(config.index.default_limit, 5);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let result = Config::from_toml_str(
            r#"
[chunking]
chunk_size = 8
overlap = 8
"#,
        );
        assert!(matches!(
            result,
            Err(crate::Error::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn rejects_zero_chunk_size_and_empty_separator() {
        let mut chunking = ChunkingConfig {
            chunk_size: 0,
            overlap: 0,
            ..ChunkingConfig::default()
        };
        assert!(chunking.validate().is_err());

        chunking.chunk_size = 32;
        chunking.separators.push(String::new());
        assert!(chunking.validate().is_err());

        chunking.mode = ChunkMode::Characters;
        assert!(chunking.validate().is_ok());
    }

    #[test]
    fn load_reads_file_and_rejects_missing_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[embedding]\nprovider = \"hashed\"\n\n[index]\ndefault_limit = 9\n",
        )
        .expect("write config");

        let config = Config::load(Some(&path)).expect("load config");
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashed);
        assert_eq!(config.index.default_limit, 9);

        let missing = Config::load(Some(&temp.path().join("absent.toml")));
        assert!(matches!(
            missing,
            Err(crate::Error::Config(ConfigError::Load(_)))
        ));
    }
}
