//! Blob storage seam.
//!
//! The core treats file contents as opaque: `put` yields a storage
//! descriptor that is persisted alongside the owning record, `remove` is
//! best-effort at every call site. `LocalFileStore` is the bundled
//! implementation; an object-store backend would implement the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::uuid::uuidv7;

/// An inbound file payload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub original_name: String,
}

/// Storage descriptor for a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub stored_name: String,
    pub relative_path: String,
    pub mime: String,
    pub size_bytes: i64,
    pub checksum: String,
}

/// Content-addressed blob storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, upload: &FileUpload) -> CoreResult<StoredFile>;

    /// Remove a stored blob. Removing an already-absent blob is not an error.
    async fn remove(&self, relative_path: &str) -> CoreResult<()>;
}

/// Filesystem-backed store rooted at one directory.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> CoreResult<PathBuf> {
        // Descriptors are produced by `put` and never contain separators,
        // but paths also arrive from DB rows; refuse anything that climbs out.
        let rel = Path::new(relative_path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CoreError::Validation(format!(
                "invalid storage path: {relative_path}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, upload: &FileUpload) -> CoreResult<StoredFile> {
        let extension = Path::new(&upload.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let stored_name = format!("{}.{}", uuidv7(), extension);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CoreError::Internal(format!("file store mkdir: {e}")))?;
        tokio::fs::write(self.root.join(&stored_name), &upload.bytes)
            .await
            .map_err(|e| CoreError::Internal(format!("file store write: {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(&upload.bytes);
        let checksum = format!("{:x}", hasher.finalize());

        Ok(StoredFile {
            relative_path: stored_name.clone(),
            stored_name,
            mime: upload.mime.clone(),
            size_bytes: upload.bytes.len() as i64,
            checksum,
        })
    }

    async fn remove(&self, relative_path: &str) -> CoreResult<()> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Internal(format!("file store remove: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> FileUpload {
        FileUpload {
            bytes: b"%PDF-1.7 test".to_vec(),
            mime: "application/pdf".to_string(),
            original_name: "convention.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn put_writes_blob_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let stored = store.put(&upload()).await.unwrap();
        assert!(stored.stored_name.ends_with(".pdf"));
        assert_eq!(stored.size_bytes, 13);
        assert_eq!(stored.mime, "application/pdf");
        assert_eq!(stored.checksum.len(), 64);

        let on_disk = std::fs::read(dir.path().join(&stored.relative_path)).unwrap();
        assert_eq!(on_disk, b"%PDF-1.7 test");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let stored = store.put(&upload()).await.unwrap();
        store.remove(&stored.relative_path).await.unwrap();
        assert!(!dir.path().join(&stored.relative_path).exists());

        // Second removal of the same path is fine.
        store.remove(&stored.relative_path).await.unwrap();
    }

    #[tokio::test]
    async fn remove_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(matches!(
            store.remove("../outside").await,
            Err(CoreError::Validation(_))
        ));
    }
}
