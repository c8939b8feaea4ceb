//! Media storage for uploaded post images.
//!
//! Files live under a single media root. Each upload gets a fresh
//! `<upload_to>/<uuid>-<slugified-name>.<ext>` path so two uploads never
//! collide, and the stored path (relative to the root) is what the database
//! keeps. Public URLs are `/media/<stored path>`.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// URL prefix under which stored files are served.
pub const MEDIA_URL_PREFIX: &str = "/media/";

const PARTIAL_SUFFIX: &str = ".part";
const MAX_STEM_CHARS: usize = 100;
const MAX_EXTENSION_CHARS: usize = 10;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Path relative to the media root, always with `/` separators.
    pub stored_path: String,
    /// Hex SHA-256 of the payload.
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem-backed media storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Open storage at `root`, creating the directory when missing.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write `data` below `upload_to` under a fresh name.
    ///
    /// The payload lands in a `.part` sibling first and is renamed into
    /// place, so readers never observe a half-written image.
    pub async fn store(
        &self,
        upload_to: &str,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }

        let stored_path = build_stored_path(upload_to, original_name);
        let target = self.resolve(&stored_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        if let Err(err) = write_file(&partial, &data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(err.into());
        }
        fs::rename(&partial, &target).await?;

        Ok(StoredUpload {
            stored_path,
            checksum: hex::encode(Sha256::digest(&data)),
            size_bytes: data.len() as u64,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let data = fs::read(self.resolve(stored_path)?).await?;
        Ok(Bytes::from(data))
    }

    /// Remove a stored file. A file that is already gone counts as removed.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        match fs::remove_file(self.resolve(stored_path)?).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Map a stored path onto the media root. Only plain relative segments pass.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if stored_path.is_empty() || !plain {
            return Err(UploadStorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

async fn write_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

/// Public URL for a stored path.
pub fn media_url(stored_path: &str) -> String {
    format!("{MEDIA_URL_PREFIX}{stored_path}")
}

fn build_stored_path(upload_to: &str, original_name: &str) -> String {
    let directory = upload_to.trim_matches('/');
    let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(original_name));
    if directory.is_empty() {
        filename
    } else {
        format!("{directory}/{filename}")
    }
}

/// Slugified stem plus lowercased extension, both capped so the stored path
/// stays well inside filesystem name limits and the `posts.image` column.
fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let base = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| truncate(&slugify(stem), MAX_STEM_CHARS))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "upload".to_string());

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| truncate(&slugify(ext), MAX_EXTENSION_CHARS))
        .filter(|ext| !ext.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let cut: String = value.chars().take(max_chars).collect();
    cut.trim_end_matches('-').to_string()
}
