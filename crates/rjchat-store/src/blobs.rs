//! Filesystem blob storage.
//!
//! Blobs are grouped by purpose into namespaces (`avatars`, `images`,
//! `files`), one directory each under the store's base path.  Callers only
//! ever see the opaque URL returned by [`BlobStore::upload`], of the form
//! `blob:<namespace>/<name>`.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use rjchat_shared::constants::{AVATARS_NAMESPACE, FILES_NAMESPACE, IMAGES_NAMESPACE};
use rjchat_shared::types::{ConversationId, UserId};

use crate::error::{Result, StoreError};

const URL_SCHEME: &str = "blob:";

/// Namespaced location of one blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath {
    pub namespace: String,
    pub name: String,
}

impl BlobPath {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// A user's avatar.  Stable per user, so re-uploading replaces it.
    pub fn avatar(uid: &UserId) -> Self {
        Self::new(AVATARS_NAMESPACE, uid.as_str())
    }

    /// A group's photo.  Stable per group, so a new photo replaces the old.
    pub fn group_photo(id: &ConversationId) -> Self {
        Self::new(IMAGES_NAMESPACE, id.as_str())
    }

    /// A fresh image slot (message images, initial group photos, stories).
    pub fn image() -> Self {
        Self::new(IMAGES_NAMESPACE, Uuid::new_v4().to_string())
    }

    /// A fresh slot for a non-image attachment.
    pub fn file() -> Self {
        Self::new(FILES_NAMESPACE, Uuid::new_v4().to_string())
    }

    pub fn url(&self) -> String {
        format!("{URL_SCHEME}{}/{}", self.namespace, self.name)
    }

    /// Parse a URL previously returned by [`BlobStore::upload`].
    pub fn parse_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| StoreError::InvalidBlobPath(url.to_string()))?;
        let (namespace, name) = rest
            .split_once('/')
            .ok_or_else(|| StoreError::InvalidBlobPath(url.to_string()))?;
        let path = Self::new(namespace, name);
        path.validate()?;
        Ok(path)
    }

    /// Reject any segment that is empty, contains a separator, or is a
    /// relative component.
    fn validate(&self) -> Result<()> {
        for segment in [&self.namespace, &self.name] {
            if segment.is_empty()
                || segment.contains('/')
                || segment.contains('\\')
                || segment.contains("..")
                || segment.contains('\0')
                || segment == "."
            {
                return Err(StoreError::InvalidBlobPath(self.url()));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for BlobPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Verify that a resolved path stays within the base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(StoreError::InvalidBlobPath(target.display().to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(base) {
        return Err(StoreError::InvalidBlobPath(target.display().to_string()));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoreError::BlobStorage(format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;
        let base_path = base_path.canonicalize().unwrap_or(base_path);

        info!(path = %base_path.display(), max_size, "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Write `data` at `path`, replacing any existing blob, and return its URL.
    pub async fn upload(&self, path: &BlobPath, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(StoreError::BlobStorage("Empty blob".to_string()));
        }
        if data.len() > self.max_size {
            return Err(StoreError::BlobTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let target = self.resolve(path)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(&target, data).await.map_err(|e| {
            StoreError::BlobStorage(format!("Failed to write blob {}: {}", path, e))
        })?;

        debug!(blob = %path, size = data.len(), "Stored blob");
        Ok(path.url())
    }

    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let path = BlobPath::parse_url(url)?;
        let target = self.resolve(&path)?;

        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StoreError::BlobNotFound(path.to_string()));
        }

        let data = fs::read(&target).await.map_err(|e| {
            StoreError::BlobStorage(format!("Failed to read blob {}: {}", path, e))
        })?;

        debug!(blob = %path, size = data.len(), "Retrieved blob");
        Ok(Bytes::from(data))
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        let path = BlobPath::parse_url(url)?;
        let target = self.resolve(&path)?;

        if !fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StoreError::BlobNotFound(path.to_string()));
        }

        fs::remove_file(&target).await.map_err(|e| {
            StoreError::BlobStorage(format!("Failed to delete blob {}: {}", path, e))
        })?;

        debug!(blob = %path, "Deleted blob");
        Ok(())
    }

    fn resolve(&self, path: &BlobPath) -> Result<PathBuf> {
        path.validate()?;
        let raw = self.base_path.join(&path.namespace).join(&path.name);
        ensure_within(&self.base_path, &raw)
    }
}
