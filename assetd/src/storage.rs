//! Asset storage: the flat directory uploads are written into.
//!
//! Every stored asset is named `<uuid>.<extension>` directly inside the asset directory. The
//! extension is taken from the uploaded filename as the segment right after its *first* dot, so
//! `photo.tar.gz` is stored as `<uuid>.tar`. Clients that depend on the current public paths
//! expect this, so it is kept as is.
//!
//! A batch of parts is stored in order and the first failure ends the batch: the error is returned,
//! no paths are reported, and files already written by the batch (including a partially written
//! one) are left where they are. There is no rollback and no retry.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::types::{AssetId, abbrev_uuid};

/// One file entry of an upload request.
pub struct UploadPart {
    /// Filename as sent by the client; only its extension is kept
    pub file_name: String,
    /// The part's bytes
    pub source: Box<dyn AsyncRead + Send + Unpin>,
}

impl UploadPart {
    pub fn new(file_name: impl Into<String>, source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            file_name: file_name.into(),
            source: Box::new(source),
        }
    }
}

impl std::fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPart").field("file_name", &self.file_name).finish_non_exhaustive()
    }
}

/// Extracts the stored extension of an uploaded filename: the text between the first and second
/// dot (or the end of the name).
///
/// Names without a dot have no extension, and extensions that would reach outside the asset
/// directory are refused.
pub fn extension_of(file_name: &str) -> Option<&str> {
    let ext = file_name.split('.').nth(1)?;
    if ext.contains(['/', '\\']) {
        return None;
    }
    Some(ext)
}

/// Writes uploads into the asset directory and reports their public paths.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    public_prefix: String,
}

impl AssetStore {
    /// Creates a store over `dir`, reporting paths under `public_prefix`.
    ///
    /// Fails with [`Error::Configuration`] when `dir` is empty.
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(Error::Configuration {
                message: "asset directory path can't be empty".to_string(),
            });
        }

        Ok(Self {
            dir,
            public_prefix: public_prefix.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Makes sure the asset directory exists, creating it (and its parents) when `create` is set.
    pub async fn prepare(&self, create: bool) -> Result<()> {
        if create {
            fs::create_dir_all(&self.dir).await.map_err(|e| Error::Configuration {
                message: format!("failed to create asset directory {}: {e}", self.dir.display()),
            })?;
        }

        match fs::metadata(&self.dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(Error::Configuration {
                message: format!("asset path {} is not a directory", self.dir.display()),
            }),
            Err(e) => Err(Error::Configuration {
                message: format!("asset directory {} is not accessible: {e}", self.dir.display()),
            }),
        }
    }

    /// Storage name of an asset, relative to the asset directory.
    pub fn file_name(id: AssetId, ext: &str) -> String {
        format!("{id}.{ext}")
    }

    /// Public path of an asset, e.g. `/assets/<uuid>.png`.
    pub fn public_path(&self, id: AssetId, ext: &str) -> String {
        format!("{}{}", self.public_prefix, Self::file_name(id, ext))
    }

    /// Stores every part, in order, and returns their public paths in the same order.
    ///
    /// The first part that fails to be stored aborts the whole batch with its error; paths of
    /// parts stored before it are discarded, their files are kept.
    #[instrument(skip_all, fields(parts = parts.len()))]
    pub async fn store_all(&self, parts: Vec<UploadPart>) -> Result<Vec<String>> {
        let mut paths = Vec::with_capacity(parts.len());

        for part in parts {
            let path = self.store(part).await?;
            paths.push(path);
        }

        info!(stored = paths.len(), "Upload batch stored");
        Ok(paths)
    }

    /// Stores a single part under a fresh identifier and returns its public path.
    pub async fn store(&self, mut part: UploadPart) -> Result<String> {
        let ext = extension_of(&part.file_name).ok_or_else(|| Error::InvalidFileName {
            file_name: part.file_name.clone(),
        })?;

        let id: AssetId = Uuid::new_v4();
        let path = self.dir.join(Self::file_name(id, ext));

        debug!(asset_id = %abbrev_uuid(&id), file_name = %part.file_name, path = %path.display(), "Creating asset file");

        // create_new: an existing file at this path is a hard failure, never overwritten
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| {
                warn!(path = %path.display(), error = %source, "Failed to create asset file");
                Error::StorageCreate { path: path.clone(), source }
            })?;

        let written = match copy_and_flush(&mut part.source, &mut file).await {
            Ok(written) => written,
            Err(source) => {
                warn!(path = %path.display(), error = %source, "Failed to write asset file");
                return Err(Error::StorageWrite { path, source });
            }
        };

        info!(asset_id = %id, bytes = written, ext, "Stored asset");

        Ok(self.public_path(id, ext))
    }
}

async fn copy_and_flush(source: &mut (dyn AsyncRead + Send + Unpin), file: &mut fs::File) -> std::io::Result<u64> {
    let written = tokio::io::copy(source, file).await?;
    file.flush().await?;
    Ok(written)
}
