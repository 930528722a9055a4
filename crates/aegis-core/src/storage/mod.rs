//! Storage contract and backends.
//!
//! Archives and manifests are written through [`StorageBackend`]:
//!
//! - **Filesystem**: local directory tree
//! - **S3 / GCS / Azure**: object storage via `object_store`
//! - **Memory**: in-memory storage (for testing and simulation)

mod backend;
mod config;
mod filesystem;
mod object;

pub use backend::StorageBackend;
pub use config::StorageBackendConfig;
pub use filesystem::FilesystemBackend;
pub use object::{ObjectStoreBackend, S3Config};

use crate::Result;
use std::sync::Arc;

/// Create a storage backend from configuration
pub fn create_backend(config: &StorageBackendConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        StorageBackendConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key,
            secret_key,
            prefix,
            allow_http,
        } => Ok(Arc::new(ObjectStoreBackend::s3(S3Config {
            bucket: bucket.clone(),
            region: region.clone(),
            endpoint: endpoint.clone(),
            access_key_id: access_key.clone(),
            secret_access_key: secret_key.clone(),
            prefix: prefix.clone(),
            allow_http: *allow_http,
        })?)),

        StorageBackendConfig::Azure {
            account_name,
            container_name,
            account_key,
            prefix,
        } => Ok(Arc::new(ObjectStoreBackend::azure(
            account_name,
            container_name,
            account_key.as_deref(),
            prefix.clone(),
        )?)),

        StorageBackendConfig::Gcs {
            bucket,
            service_account_path,
            prefix,
        } => Ok(Arc::new(ObjectStoreBackend::gcs(
            bucket,
            service_account_path.as_deref(),
            prefix.clone(),
        )?)),

        StorageBackendConfig::Filesystem { path } => {
            Ok(Arc::new(FilesystemBackend::new(path.clone())))
        }

        StorageBackendConfig::Memory => Ok(Arc::new(ObjectStoreBackend::memory())),
    }
}
