//! Storage service for uploaded files.

use async_trait::async_trait;
use gifted_common::{AppError, AppResult};
use std::path::PathBuf;

/// Storage backend trait for file operations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save file data under `key`.
    async fn save(&self, key: &str, data: &[u8]) -> AppResult<()>;

    /// Delete a file from storage.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a file.
    fn get_url(&self, key: &str) -> String;

    /// Recover the key of a URL produced by [`Self::get_url`].
    ///
    /// Returns `None` for URLs this backend did not hand out.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Strip `base_url/` off `url`, leaving a non-empty key.
fn strip_base(base_url: &str, url: &str) -> Option<String> {
    url.strip_prefix(base_url)?
        .strip_prefix('/')
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    /// Base directory for storing files.
    base_path: PathBuf,
    /// URL prefix the base directory is served under.
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the full path for a storage key.
    fn get_path(&self, key: &str) -> AppResult<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(AppError::Validation(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let path = self.get_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {e}")))?;

        tracing::debug!(key = %key, bytes = data.len(), "Stored file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.get_path(key)?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete file: {e}")))?;
            tracing::debug!(key = %key, "Deleted file");
        }

        Ok(())
    }

    fn get_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        strip_base(&self.base_url, url)
    }
}

/// No-op storage backend for tests.
#[derive(Clone, Default)]
pub struct NoOpStorage {
    base_url: String,
}

impl NoOpStorage {
    /// Create a new no-op storage backend.
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl StorageBackend for NoOpStorage {
    async fn save(&self, _key: &str, _data: &[u8]) -> AppResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Ok(())
    }

    fn get_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        strip_base(&self.base_url, url)
    }
}

/// Type alias for the storage service.
pub type StorageService = std::sync::Arc<dyn StorageBackend>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_storage() -> (LocalStorage, PathBuf) {
        let dir = std::env::temp_dir().join(format!("gifted-storage-{}", ulid::Ulid::new()));
        (
            LocalStorage::new(dir.clone(), "/media/".to_string()),
            dir,
        )
    }

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let (storage, dir) = temp_storage();

        storage.save("gift_images/a.jpg", b"jpeg").await.unwrap();
        let path = dir.join("gift_images/a.jpg");
        assert!(tokio::fs::try_exists(&path).await.unwrap());

        storage.delete("gift_images/a.jpg").await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());

        // Deleting again is not an error
        storage.delete("gift_images/a.jpg").await.unwrap();

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[test]
    fn test_key_for_url() {
        let (storage, _dir) = temp_storage();

        assert_eq!(
            storage.key_for_url("/media/gift_images/a.jpg").as_deref(),
            Some("gift_images/a.jpg")
        );
        assert_eq!(storage.key_for_url("https://elsewhere.example/a.jpg"), None);
        assert_eq!(storage.key_for_url("/mediax/a.jpg"), None);
        assert_eq!(storage.key_for_url("/media/"), None);
    }

    #[tokio::test]
    async fn test_local_storage_rejects_traversal() {
        let (storage, _dir) = temp_storage();

        let result = storage.save("../escape.jpg", b"x").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_get_url_trims_trailing_slash() {
        let (storage, _dir) = temp_storage();
        assert_eq!(
            storage.get_url("profile_pictures/u.jpg"),
            "/media/profile_pictures/u.jpg"
        );
    }
}
