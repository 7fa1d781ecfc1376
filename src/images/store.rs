//! Content-addressed image storage
//!
//! Images are stored as flat files named by their MD5 hash, enabling:
//! - Deduplication (same image content = same identifier)
//! - Immutable caching (an identifier never changes content)
//! - Sharding (`<root>/<first two chars>/<identifier>`)

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use super::identifier::{Identifier, IdentifierError};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("image not exist")]
    NotFound,

    #[error(transparent)]
    Unsupported(#[from] IdentifierError),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result of storing an upload
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub identifier: Identifier,
    /// `false` when identical content was already on disk
    pub created: bool,
}

/// Flat-file, sharded image store
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Create a new image store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an identifier
    pub fn path_for(&self, identifier: &Identifier) -> PathBuf {
        self.root.join(identifier.relative_path())
    }

    /// Create the storage root if missing
    pub async fn ensure_root(&self) -> io::Result<()> {
        create_dir_all(&self.root).await
    }

    /// Whether the storage root is a usable directory
    pub async fn is_available(&self) -> bool {
        matches!(tokio::fs::metadata(&self.root).await, Ok(meta) if meta.is_dir())
    }

    /// Check if an image exists
    pub async fn exists(&self, identifier: &Identifier) -> bool {
        tokio::fs::try_exists(self.path_for(identifier))
            .await
            .unwrap_or(false)
    }

    /// Store image bytes by hash (deduplication).
    ///
    /// Existing files are never overwritten. New content goes to a temp
    /// file in the shard directory and is renamed into place, so readers
    /// never observe a partial image.
    pub async fn store(&self, data: Vec<u8>, extension: &str) -> Result<StoredImage, StoreError> {
        let identifier = Identifier::for_content(&data, extension)?;
        let path = self.path_for(&identifier);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        create_dir_all(&dir).await?;

        if self.exists(&identifier).await {
            debug!("Image {} already stored", identifier);
            return Ok(StoredImage {
                identifier,
                created: false,
            });
        }

        let created =
            tokio::task::spawn_blocking(move || write_new(&dir, &path, &data)).await??;
        if !created {
            debug!("Image {} stored concurrently by another upload", identifier);
        }

        Ok(StoredImage {
            identifier,
            created,
        })
    }

    /// Read the stored bytes of an image.
    ///
    /// Missing paths and directories both report [`StoreError::NotFound`].
    pub async fn load(&self, identifier: &Identifier) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(identifier);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StoreError::NotFound),
            Err(e) => return Err(not_found_or(e)),
        }

        tokio::fs::read(&path).await.map_err(not_found_or)
    }
}

fn not_found_or(e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(e)
    }
}

/// Recursively create a directory, world-accessible before umask
async fn create_dir_all(path: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder.create(path).await
}

/// Write `data` to `path` unless it already exists.
///
/// Returns `Ok(false)` if another writer got there first.
fn write_new(dir: &Path, path: &Path, data: &[u8]) -> io::Result<bool> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
