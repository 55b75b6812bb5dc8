//! Directory Shard Backend
//!
//! Stores one object's shards, metadata and decoded output as files in a
//! coding directory:
//!
//! ```text
//! Coding/
//! ├── photo_k1.jpg ... photo_k4.jpg     data shards
//! ├── photo_m1.jpg ... photo_m2.jpg     parity shards
//! ├── photo_meta.json                   run metadata
//! └── photo_decoded.jpg                 decoded output (after decode)
//! ```
//!
//! Shard numbers are 1-based and zero-padded to the digit count of k.
//! Decoded output is written to `<name>.partial` and renamed on commit.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::domain::ports::ShardBackend;
use crate::ec::metadata::RunMetadata;
use crate::error::{Error, Result};

/// Default coding directory name
pub const DEFAULT_CODING_DIR: &str = "Coding";

const PARTIAL_SUFFIX: &str = ".partial";

// =============================================================================
// Naming
// =============================================================================

/// File naming of one object inside the coding directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardNaming {
    /// Source file name without extension
    pub stem: String,

    /// Source extension including the dot; empty when there is none
    pub extension: String,
}

impl ShardNaming {
    /// Derive the naming from a source path (`dir/photo.jpg` → `photo`, `.jpg`).
    pub fn from_source(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "object".to_string());
        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        Self { stem, extension }
    }

    /// File name of `shard` for a code with `data_shards` data shards.
    pub fn shard_file(&self, shard: usize, data_shards: usize) -> String {
        let width = data_shards.to_string().len();
        let (kind, number) = if shard < data_shards {
            ('k', shard + 1)
        } else {
            ('m', shard - data_shards + 1)
        };
        format!(
            "{}_{}{:0width$}{}",
            self.stem,
            kind,
            number,
            self.extension,
            width = width
        )
    }

    pub fn metadata_file(&self) -> String {
        format!("{}_meta.json", self.stem)
    }

    pub fn decoded_file(&self) -> String {
        format!("{}_decoded{}", self.stem, self.extension)
    }
}

// =============================================================================
// Backend
// =============================================================================

/// Backend over a local coding directory.
///
/// Shard file names depend on k, which is taken from
/// [`with_data_shards`](Self::with_data_shards) or from the metadata record
/// once it has been loaded or stored.
#[derive(Debug)]
pub struct DirectoryBackend {
    dir: PathBuf,
    naming: ShardNaming,
    data_shards: RwLock<Option<usize>>,
}

impl DirectoryBackend {
    /// Backend for `source` inside an existing coding directory.
    pub fn new(dir: impl Into<PathBuf>, source: &Path) -> Self {
        Self {
            dir: dir.into(),
            naming: ShardNaming::from_source(source),
            data_shards: RwLock::new(None),
        }
    }

    /// Backend for `source`, creating the coding directory if needed.
    pub async fn create(dir: impl Into<PathBuf>, source: &Path) -> Result<Self> {
        let backend = Self::new(dir, source);
        fs::create_dir_all(&backend.dir).await?;
        Ok(backend)
    }

    /// Fix the number of data shards used for shard file names.
    pub fn with_data_shards(self, data_shards: usize) -> Self {
        *self.data_shards.write() = Some(data_shards);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &ShardNaming {
        &self.naming
    }

    /// Path of `shard`'s file.
    pub fn shard_path(&self, shard: usize) -> Result<PathBuf> {
        let data_shards = (*self.data_shards.read()).ok_or_else(|| {
            Error::Internal("shard layout unknown before metadata is available".to_string())
        })?;
        Ok(self.dir.join(self.naming.shard_file(shard, data_shards)))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(self.naming.metadata_file())
    }

    pub fn decoded_path(&self) -> PathBuf {
        self.dir.join(self.naming.decoded_file())
    }

    fn partial_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.naming.decoded_file(), PARTIAL_SUFFIX))
    }

    async fn write_file(path: &Path, data: &[u8], append: bool) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ShardBackend for DirectoryBackend {
    async fn shard_len(&self, shard: usize) -> Result<Option<u64>> {
        let path = self.shard_path(shard)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_shard(&self, shard: usize, offset: u64, buf: &mut [u8]) -> Result<()> {
        let path = self.shard_path(shard)?;
        let mut file = fs::File::open(&path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_shard(&self, shard: usize, data: &[u8], append: bool) -> Result<()> {
        let path = self.shard_path(shard)?;
        Self::write_file(&path, data, append).await
    }

    async fn load_metadata(&self) -> Result<RunMetadata> {
        let path = self.metadata_path();
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::MetadataNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = RunMetadata::from_json(&json)?;
        *self.data_shards.write() = Some(metadata.data_shards);
        debug!("Loaded metadata from {}", path.display());
        Ok(metadata)
    }

    async fn store_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        let path = self.metadata_path();
        fs::write(&path, metadata.to_json()?).await?;
        *self.data_shards.write() = Some(metadata.data_shards);
        debug!("Stored metadata to {}", path.display());
        Ok(())
    }

    async fn write_decoded(&self, data: &[u8], append: bool) -> Result<()> {
        Self::write_file(&self.partial_path(), data, append).await
    }

    async fn commit_decoded(&self) -> Result<()> {
        let partial = self.partial_path();
        if fs::metadata(&partial).await.is_err() {
            Self::write_file(&partial, &[], false).await?;
        }
        fs::rename(&partial, self.decoded_path()).await?;
        Ok(())
    }

    async fn discard_decoded(&self) -> Result<()> {
        match fs::remove_file(self.partial_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
