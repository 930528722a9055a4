//! Filesystem storage backend implementation.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::StorageBackend;
use crate::error::StorageError;
use crate::Result;

/// Filesystem-based storage backend rooted at a base directory
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base path
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a filesystem path under the base directory.
    ///
    /// Absolute keys and keys containing `..` are rejected.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(key.to_string()).into()),
            }
        }
        Ok(self.base_path.join(relative))
    }

    /// Convert a filesystem path to a storage key
    fn path_to_key(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.base_path).ok().map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    /// Walk the tree under `dir`, collecting file keys
    async fn walk(&self, dir: PathBuf, results: &mut Vec<String>) -> Result<()> {
        let mut stack = vec![dir];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::Backend(format!(
                        "Failed to read directory {}: {}",
                        dir.display(),
                        e
                    ))
                    .into())
                }
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                StorageError::Backend(format!("Failed to read directory entry: {}", e))
            })? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| {
                    StorageError::Backend(format!("Failed to stat {}: {}", path.display(), e))
                })?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if is_temp_file(&path) {
                    continue;
                } else if let Some(key) = self.path_to_key(&path) {
                    results.push(key);
                }
            }
        }
        Ok(())
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_to_path(key)?;
        debug!("FS PUT: {}", path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Backend(format!("Failed to create directories: {}", e))
            })?;
        }

        // Write beside the target, then rename into place
        let tmp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
            StorageError::Backend(format!(
                "Failed to create file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::Backend(format!(
                "Failed to write to file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::Backend(format!(
                "Failed to flush file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Backend(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            ))
            .into());
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_to_path(key)?;
        debug!("FS GET: {}", path.display());

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Backend(format!("Failed to read file {}: {}", path.display(), e))
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut results = Vec::new();

        // Prefixes may end mid-name, so walk from the deepest complete directory
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.key_to_path(dir_part)?;
        self.walk(start, &mut results).await?;

        results.retain(|key| key.starts_with(prefix));
        results.sort();
        Ok(results)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_to_path(key)?;
        debug!("FS DELETE: {}", path.display());

        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Backend(format!("Failed to delete file {}: {}", path.display(), e))
            }
        })?;

        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list(prefix).await?;
        for key in &keys {
            self.delete(key).await?;
        }

        // Drop the record directory when the prefix names one
        if prefix.ends_with('/') {
            let dir = self.key_to_path(prefix.trim_end_matches('/'))?;
            let _ = fs::remove_dir_all(&dir).await;
        }

        Ok(keys.len())
    }
}
