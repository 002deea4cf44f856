//! Content-addressed blob storage for drawing payloads and thumbnails.
//!
//! Blobs are named by the SHA-256 hex of their contents, so writes are
//! idempotent and identical payloads deduplicate for free. The trait is the
//! seam where an external object-storage backend would plug in.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning their content hash. Idempotent.
    async fn put(&self, data: Bytes) -> Result<String, BlobError>;

    async fn get(&self, hash: &str) -> Result<Bytes, BlobError>;

    async fn exists(&self, hash: &str) -> bool;

    /// Remove a blob. Deleting a missing blob is not an error.
    async fn delete(&self, hash: &str) -> Result<(), BlobError>;
}

pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    pub fn new(base_path: PathBuf) -> Result<Self, BlobError> {
        std::fs::create_dir_all(&base_path)?;
        Ok(FilesystemBlobStore { base_path })
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        // Two-character fanout keeps any single directory small.
        let prefix = &hash[..2.min(hash.len())];
        self.base_path.join(prefix).join(hash)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, data: Bytes) -> Result<String, BlobError> {
        let hash = compute_hash(&data);
        let path = self.blob_path(&hash);

        if path.exists() {
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temporary name first, then rename for atomicity.
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &path).await?;

        tracing::debug!("stored blob {hash} ({} bytes)", data.len());
        Ok(hash)
    }

    async fn get(&self, hash: &str) -> Result<Bytes, BlobError> {
        let path = self.blob_path(hash);
        if !path.exists() {
            return Err(BlobError::NotFound(hash.to_string()));
        }

        let data = fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, hash: &str) -> bool {
        self.blob_path(hash).exists()
    }

    async fn delete(&self, hash: &str) -> Result<(), BlobError> {
        let path = self.blob_path(hash);
        if path.exists() {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Bytes) -> Result<String, BlobError> {
        let hash = compute_hash(&data);
        self.blobs.write().insert(hash.clone(), data);
        Ok(hash)
    }

    async fn get(&self, hash: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(hash.to_string()))
    }

    async fn exists(&self, hash: &str) -> bool {
        self.blobs.read().contains_key(hash)
    }

    async fn delete(&self, hash: &str) -> Result<(), BlobError> {
        self.blobs.write().remove(hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filesystem_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().to_path_buf()).unwrap();

        let data = Bytes::from_static(b"{\"elements\":[]}");
        let hash = store.put(data.clone()).await.unwrap();
        assert_eq!(hash, compute_hash(&data));

        assert!(store.exists(&hash).await);
        assert_eq!(store.get(&hash).await.unwrap(), data);

        // Idempotent put.
        assert_eq!(store.put(data.clone()).await.unwrap(), hash);

        store.delete(&hash).await.unwrap();
        assert!(!store.exists(&hash).await);
        assert!(matches!(
            store.get(&hash).await,
            Err(BlobError::NotFound(_))
        ));

        // Deleting again is a no-op.
        store.delete(&hash).await.unwrap();
    }

    #[tokio::test]
    async fn test_fanout_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemBlobStore::new(dir.path().to_path_buf()).unwrap();

        let hash = store.put(Bytes::from_static(b"abc")).await.unwrap();
        let expected = dir.path().join(&hash[..2]).join(&hash);
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryBlobStore::new();
        let hash = store.put(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(store.get(&hash).await.unwrap(), Bytes::from_static(b"abc"));
        store.delete(&hash).await.unwrap();
        assert!(!store.exists(&hash).await);
    }

    #[test]
    fn test_compute_hash_known_value() {
        assert_eq!(
            compute_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
