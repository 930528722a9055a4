//! Object-store backed storage: in-memory, S3, GCS and Azure Blob.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use tracing::{debug, info};

use super::StorageBackend;
use crate::error::StorageError;
use crate::{Error, Result};

/// S3 connection settings
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub prefix: Option<String>,
    pub allow_http: bool,
}

/// Storage backend over any `object_store` implementation
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    /// Label used in log lines and error messages
    label: &'static str,
}

impl ObjectStoreBackend {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<String>, label: &'static str) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            store,
            prefix,
            label,
        }
    }

    /// Non-persistent in-memory storage
    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), None, "memory")
    }

    /// AWS S3 or an S3-compatible service
    pub fn s3(config: S3Config) -> Result<Self> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }
        if let Some(access_key) = &config.access_key_id {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Backend(format!("Failed to create S3 client: {}", e))
        })?;

        info!(
            "Created S3 backend for bucket: {}, prefix: {:?}",
            config.bucket, config.prefix
        );
        Ok(Self::new(Arc::new(store), config.prefix, "s3"))
    }

    /// Google Cloud Storage. Without a service account path, application
    /// default credentials are used.
    pub fn gcs(
        bucket: &str,
        service_account_path: Option<&str>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
        if let Some(path) = service_account_path {
            builder = builder.with_service_account_path(path);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Backend(format!("Failed to create GCS client: {}", e))
        })?;

        info!("Created GCS backend for bucket: {}, prefix: {:?}", bucket, prefix);
        Ok(Self::new(Arc::new(store), prefix, "gcs"))
    }

    /// Azure Blob Storage. Without an account key the default credential
    /// chain is used.
    pub fn azure(
        account_name: &str,
        container_name: &str,
        account_key: Option<&str>,
        prefix: Option<String>,
    ) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(account_name)
            .with_container_name(container_name);
        if let Some(key) = account_key {
            builder = builder.with_access_key(key);
        }

        let store = builder.build().map_err(|e| {
            StorageError::Backend(format!("Failed to create Azure client: {}", e))
        })?;

        info!(
            "Created Azure backend for {}/{}, prefix: {:?}",
            account_name, container_name, prefix
        );
        Ok(Self::new(Arc::new(store), prefix, "azure"))
    }

    /// Build the full path for a key
    fn full_path(&self, key: &str) -> Path {
        match &self.prefix {
            Some(prefix) => Path::from(format!("{}/{}", prefix, key)),
            None => Path::from(key),
        }
    }

    fn strip_prefix(&self, location: &Path) -> String {
        let key = location.to_string();
        match &self.prefix {
            Some(p) => key
                .strip_prefix(&format!("{}/", p))
                .unwrap_or(&key)
                .to_string(),
            None => key,
        }
    }

    fn backend_error(&self, op: &str, err: object_store::Error) -> Error {
        Error::Storage(StorageError::Backend(format!(
            "{} {} failed: {}",
            self.label, op, err
        )))
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.full_path(key);
        debug!("{} PUT: {}", self.label, path);

        self.store
            .put(&path, PutPayload::from_bytes(data))
            .await
            .map_err(|e| self.backend_error("PUT", e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.full_path(key);
        debug!("{} GET: {}", self.label, path);

        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::Storage(StorageError::NotFound(key.to_string()))
            }
            other => self.backend_error("GET", other),
        })?;

        result.bytes().await.map_err(|e| self.backend_error("GET", e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // object_store lists by path segment, so list the parent and filter
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let dir_path = if dir.is_empty() && self.prefix.is_none() {
            None
        } else {
            Some(self.full_path(dir))
        };
        debug!("{} LIST: {:?}", self.label, dir_path);

        let mut keys = Vec::new();
        let mut stream = self.store.list(dir_path.as_ref());
        while let Some(result) = stream.next().await {
            let meta = result.map_err(|e| self.backend_error("LIST", e))?;
            let key = self.strip_prefix(&meta.location);
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.full_path(key);
        debug!("{} HEAD: {}", self.label, path);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.backend_error("HEAD", e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.full_path(key);
        debug!("{} DELETE: {}", self.label, path);

        self.store.delete(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => {
                Error::Storage(StorageError::NotFound(key.to_string()))
            }
            other => self.backend_error("DELETE", other),
        })?;
        Ok(())
    }
}
