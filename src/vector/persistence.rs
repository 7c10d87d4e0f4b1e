//! On-disk storage for a corpus: a binary vector artifact and a JSON
//! metadata artifact.
//!
//! Layout under the index directory:
//!
//! ```text
//! CURRENT                     name of the active generation
//! gen-<timestamp>-<id>/
//!     vectors.bin             PDXV | version u32 | dimension u32 | count u64 | f32 LE rows
//!     metadata.json           dimension, count, model, sha256 of rows, records
//! ```
//!
//! A save writes a complete new generation, then swaps `CURRENT` with a
//! rename, so a reader sees either the old pair or the new pair.

use crate::error::{Error, Result};
use crate::vector::corpus::CorpusIndex;
use crate::vector::index::VectorIndex;
use crate::vector::metadata::MetadataStore;
use crate::vector::models::MetadataRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const CURRENT_FILE: &str = "CURRENT";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

const MAGIC: &[u8; 4] = b"PDXV";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const GENERATION_PREFIX: &str = "gen-";
const STAGING_SUFFIX: &str = ".staging";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataArtifact {
    format_version: u32,
    dimension: usize,
    count: usize,
    model: String,
    vectors_sha256: String,
    created_at: DateTime<Utc>,
    records: Vec<MetadataRecord>,
}

/// Summary of the persisted index, read without loading vectors.
#[derive(Debug, Clone, Serialize)]
pub struct IndexManifest {
    pub generation: String,
    pub directory: PathBuf,
    pub dimension: usize,
    pub count: usize,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Reads and writes corpus artifacts in one directory. Only one writer
/// should use a directory at a time.
#[derive(Debug, Clone)]
pub struct IndexStore {
    directory: PathBuf,
}

impl IndexStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist `corpus` as a new generation and make it current.
    ///
    /// Returns the generation directory.
    pub async fn save(&self, corpus: &CorpusIndex) -> Result<PathBuf> {
        let vectors = encode_vectors(corpus.index());
        let artifact = MetadataArtifact {
            format_version: FORMAT_VERSION,
            dimension: corpus.dimension(),
            count: corpus.len(),
            model: corpus.model_id().to_string(),
            vectors_sha256: hex::encode(Sha256::digest(&vectors[HEADER_LEN..])),
            created_at: Utc::now(),
            records: corpus.metadata().records().to_vec(),
        };
        let metadata = serde_json::to_vec_pretty(&artifact)?;

        create_dir_all(&self.directory).await?;

        let generation = format!(
            "{GENERATION_PREFIX}{}-{}",
            artifact.created_at.format("%Y%m%dT%H%M%S%3fZ"),
            uuid::Uuid::new_v4().simple()
        );
        let staging = self
            .directory
            .join(format!(".{generation}{STAGING_SUFFIX}"));
        let final_dir = self.directory.join(&generation);

        tokio::fs::create_dir(&staging)
            .await
            .map_err(|e| Error::io(&staging, e))?;
        write_synced(&staging.join(VECTORS_FILE), &vectors).await?;
        write_synced(&staging.join(METADATA_FILE), &metadata).await?;
        sync_directory(&staging).await;

        rename(&staging, &final_dir).await?;
        sync_directory(&self.directory).await;

        let pointer_tmp = self.directory.join(format!("{CURRENT_FILE}.tmp"));
        write_synced(&pointer_tmp, generation.as_bytes()).await?;
        rename(&pointer_tmp, &self.directory.join(CURRENT_FILE)).await?;
        sync_directory(&self.directory).await;

        tracing::info!(
            directory = %self.directory.display(),
            %generation,
            count = artifact.count,
            dimension = artifact.dimension,
            "index artifacts written"
        );

        self.prune_generations(&generation).await;
        Ok(final_dir)
    }

    /// Load the current corpus.
    ///
    /// `Ok(None)` means there is no index yet: `CURRENT` or one of the
    /// artifacts is absent. Anything present but inconsistent, including a
    /// dimension other than `expected_dimension`, is `CorruptArtifact`.
    pub async fn load(&self, expected_dimension: usize) -> Result<Option<CorpusIndex>> {
        let Some(generation_dir) = self.current_generation_dir().await? else {
            return Ok(None);
        };

        let vectors_path = generation_dir.join(VECTORS_FILE);
        let metadata_path = generation_dir.join(METADATA_FILE);

        let Some(metadata_bytes) = read_optional(&metadata_path).await? else {
            tracing::debug!(path = %metadata_path.display(), "metadata artifact missing");
            return Ok(None);
        };
        let Some(vector_bytes) = read_optional(&vectors_path).await? else {
            tracing::debug!(path = %vectors_path.display(), "vector artifact missing");
            return Ok(None);
        };

        let artifact: MetadataArtifact = serde_json::from_slice(&metadata_bytes)
            .map_err(|e| Error::corrupt(&metadata_path, format!("unreadable metadata: {e}")))?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(Error::corrupt(
                &metadata_path,
                format!("unsupported format version {}", artifact.format_version),
            ));
        }

        let (dimension, data) = decode_vectors(&vectors_path, &vector_bytes)?;
        let count = data.len() / dimension;

        if artifact.dimension != dimension {
            return Err(Error::corrupt(
                &metadata_path,
                format!(
                    "metadata dimension {} disagrees with vector artifact dimension {}",
                    artifact.dimension, dimension
                ),
            ));
        }
        if artifact.count != count || artifact.records.len() != count {
            return Err(Error::corrupt(
                &metadata_path,
                format!(
                    "vector artifact holds {} vectors but metadata declares {} and lists {} records",
                    count,
                    artifact.count,
                    artifact.records.len()
                ),
            ));
        }
        if dimension != expected_dimension {
            return Err(Error::corrupt(
                &vectors_path,
                format!(
                    "index dimension {} does not match the configured embedding dimension {}",
                    dimension, expected_dimension
                ),
            ));
        }
        let checksum = hex::encode(Sha256::digest(&vector_bytes[HEADER_LEN..]));
        if checksum != artifact.vectors_sha256 {
            return Err(Error::corrupt(&vectors_path, "vector checksum mismatch"));
        }

        let index = VectorIndex::from_raw(dimension, data)?;
        let metadata = MetadataStore::from_records(artifact.records);
        let corpus = CorpusIndex::from_parts(index, metadata, artifact.model)?;

        tracing::info!(
            directory = %generation_dir.display(),
            count = corpus.len(),
            dimension,
            "index loaded"
        );
        Ok(Some(corpus))
    }

    /// Like [`load`](Self::load), but a missing index is a `NotFound` error.
    pub async fn load_required(&self, expected_dimension: usize) -> Result<CorpusIndex> {
        self.load(expected_dimension)
            .await?
            .ok_or_else(|| Error::NotFound {
                path: self.directory.clone(),
            })
    }

    /// Describe the current index from its metadata artifact.
    pub async fn manifest(&self) -> Result<Option<IndexManifest>> {
        let Some(generation_dir) = self.current_generation_dir().await? else {
            return Ok(None);
        };
        let metadata_path = generation_dir.join(METADATA_FILE);
        let Some(bytes) = read_optional(&metadata_path).await? else {
            return Ok(None);
        };
        let artifact: MetadataArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt(&metadata_path, format!("unreadable metadata: {e}")))?;

        let generation = generation_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Some(IndexManifest {
            generation,
            directory: generation_dir,
            dimension: artifact.dimension,
            count: artifact.count,
            model: artifact.model,
            created_at: artifact.created_at,
        }))
    }

    async fn current_generation_dir(&self) -> Result<Option<PathBuf>> {
        let pointer = self.directory.join(CURRENT_FILE);
        let Some(bytes) = read_optional(&pointer).await? else {
            return Ok(None);
        };
        let generation = String::from_utf8(bytes)
            .map_err(|_| Error::corrupt(&pointer, "pointer is not UTF-8"))?;
        let generation = generation.trim();

        if !generation.starts_with(GENERATION_PREFIX)
            || generation.contains(['/', '\\'])
            || generation.contains("..")
        {
            return Err(Error::corrupt(
                &pointer,
                format!("invalid generation name {generation:?}"),
            ));
        }
        Ok(Some(self.directory.join(generation)))
    }

    /// Remove every generation and staging directory except `keep`.
    /// Failures are logged, not returned; the new generation is already live.
    async fn prune_generations(&self, keep: &str) {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(%error, "failed to list index directory for pruning");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "failed to read index directory entry");
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            let stale_generation = name.starts_with(GENERATION_PREFIX) && name != keep;
            let stale_staging = name.starts_with('.') && name.ends_with(STAGING_SUFFIX);
            if !stale_generation && !stale_staging {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => tracing::debug!(generation = %name, "pruned stale index generation"),
                Err(error) => {
                    tracing::warn!(generation = %name, %error, "failed to prune stale index generation")
                }
            }
        }
    }
}

fn encode_vectors(index: &VectorIndex) -> Vec<u8> {
    let raw = index.raw();
    let mut bytes = Vec::with_capacity(HEADER_LEN + raw.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for value in raw {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Parse a vector artifact into `(dimension, row-major values)`.
fn decode_vectors(path: &Path, bytes: &[u8]) -> Result<(usize, Vec<f32>)> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::corrupt(path, "vector artifact shorter than its header"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(Error::corrupt(path, "bad magic"));
    }

    let version = u32::from_le_bytes(le_array(&bytes[4..8]));
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(path, format!("unsupported format version {version}")));
    }
    let dimension = u32::from_le_bytes(le_array(&bytes[8..12])) as usize;
    let count = u64::from_le_bytes(le_array(&bytes[12..20]));
    if dimension == 0 {
        return Err(Error::corrupt(path, "dimension is zero"));
    }

    let expected_payload = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(dimension))
        .and_then(|values| values.checked_mul(4));
    let payload = &bytes[HEADER_LEN..];
    if expected_payload != Some(payload.len()) {
        return Err(Error::corrupt(
            path,
            format!(
                "header declares {count} vectors of dimension {dimension} but payload is {} bytes",
                payload.len()
            ),
        ));
    }

    let data = payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(le_array(chunk)))
        .collect();
    Ok((dimension, data))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut array = [0_u8; N];
    array.copy_from_slice(bytes);
    array
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(Error::io(path, error)),
    }
}

async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::io(path, e))
}

async fn rename(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| Error::io(to, e))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    file.write_all(bytes).await.map_err(|e| Error::io(path, e))?;
    file.sync_all().await.map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Flush directory entries (renames) to disk. Not every platform allows
/// opening a directory, so failures are only logged.
async fn sync_directory(path: &Path) {
    let result = match tokio::fs::File::open(path).await {
        Ok(dir) => dir.sync_all().await,
        Err(error) => Err(error),
    };
    if let Err(error) = result {
        tracing::trace!(path = %path.display(), %error, "directory sync skipped");
    }
}
