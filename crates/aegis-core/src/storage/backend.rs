//! Storage backend trait definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// Byte-addressable storage for archives and manifests.
///
/// Keys are `/`-separated relative paths such as
/// `bj-…/br-…/manifest.json`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to a key, replacing any previous value
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read data from a key. Fails with `StorageError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// List keys with a given prefix, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete a key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key under a prefix, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list(prefix).await?;
        let mut removed = 0;
        for key in keys {
            self.delete(&key).await?;
            removed += 1;
        }
        Ok(removed)
    }
}
