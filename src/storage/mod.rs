//! Blob storage for profile photos.
//!
//! The policy service only speaks to the [`PhotoStore`] trait; the disk
//! implementation writes under a configured directory that the HTTP layer
//! serves read-only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Subdirectory photos land in, kept in the storage key so keys stay
/// meaningful if other asset kinds are added later.
const PHOTO_SUBDIR: &str = "profile-photos";

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Persist a blob and return its storage key.
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String>;

    async fn exists(&self, path: &str) -> bool;

    /// Remove a blob. Returns false if it was already gone.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Public URL for a storage key.
    fn url(&self, path: &str) -> String;
}

pub struct DiskPhotoStore {
    root: PathBuf,
    public_base: String,
}

impl DiskPhotoStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn extension_for(content_type: &str) -> &'static str {
        match content_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            other => mime_guess::get_mime_extensions_str(other)
                .and_then(|exts| exts.first())
                .copied()
                .unwrap_or("jpg"),
        }
    }
}

#[async_trait]
impl PhotoStore for DiskPhotoStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        let extension = Self::extension_for(content_type);
        let key = format!("{}/{}.{}", PHOTO_SUBDIR, uuid::Uuid::new_v4(), extension);

        let file_path = self.full_path(&key);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&file_path, bytes)
            .await
            .with_context(|| format!("Failed to write photo to {}", file_path.display()))?;

        info!(key = %key, size = bytes.len(), "Stored profile photo");
        Ok(key)
    }

    async fn exists(&self, path: &str) -> bool {
        fs::try_exists(self.full_path(path)).await.unwrap_or(false)
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let file_path = self.full_path(path);
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete photo {}", file_path.display()))
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> DiskPhotoStore {
        let root = std::env::temp_dir().join(format!("avatarr-store-{}", uuid::Uuid::new_v4()));
        DiskPhotoStore::new(root, "/photos")
    }

    #[tokio::test]
    async fn test_put_exists_delete_roundtrip() {
        let store = temp_store();

        let key = store.put(b"not really a png", "image/png").await.unwrap();
        assert!(key.starts_with("profile-photos/"));
        assert!(key.ends_with(".png"));
        assert!(store.exists(&key).await);

        assert!(store.delete(&key).await.unwrap());
        assert!(!store.exists(&key).await);

        // Second delete reports the blob as already gone
        assert!(!store.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_url_prefixes_public_base() {
        let store = DiskPhotoStore::new("/tmp/whatever", "/photos/");
        assert_eq!(store.url("profile-photos/a.jpg"), "/photos/profile-photos/a.jpg");
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(DiskPhotoStore::extension_for("image/png"), "png");
        assert_eq!(DiskPhotoStore::extension_for("application/octet-stream"), "jpg");
    }
}
