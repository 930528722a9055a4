//! Storage configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage backend configuration, tagged by `backend`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend")]
pub enum StorageBackendConfig {
    /// AWS S3 or S3-compatible storage (MinIO, Ceph RGW, ...)
    #[serde(rename = "s3")]
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint URL (for S3-compatible services)
        #[serde(default)]
        endpoint: Option<String>,
        /// Access key ID (falls back to AWS_ACCESS_KEY_ID env var)
        #[serde(default)]
        access_key: Option<String>,
        /// Secret access key (falls back to AWS_SECRET_ACCESS_KEY env var)
        #[serde(default)]
        secret_key: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        allow_http: bool,
    },

    /// Azure Blob Storage
    #[serde(rename = "azure")]
    Azure {
        account_name: String,
        container_name: String,
        /// Storage account key (if None, uses the default credential chain)
        #[serde(default)]
        account_key: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },

    /// Google Cloud Storage
    #[serde(rename = "gcs")]
    Gcs {
        bucket: String,
        /// Service account JSON key file (if None, uses application default credentials)
        #[serde(default)]
        service_account_path: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },

    /// Local filesystem storage
    #[serde(rename = "filesystem")]
    Filesystem { path: PathBuf },

    /// In-memory storage (for testing and simulation)
    #[serde(rename = "memory")]
    Memory,
}

impl Default for StorageBackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from(crate::config::DEFAULT_STORAGE_ROOT),
        }
    }
}

impl StorageBackendConfig {
    /// Parse configuration from a URL string
    ///
    /// Supported URL formats:
    /// - `s3://bucket-name?region=us-east-1&endpoint=http://minio:9000`
    /// - `azure://account/container`
    /// - `gs://bucket-name` (or `gcs://`)
    /// - `file:///path/to/data`
    /// - `memory://`
    pub fn from_url(url: &str) -> crate::Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| crate::Error::Config(format!("Invalid storage URL: {}", e)))?;
        let query = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.to_string())
        };
        let prefix = query("prefix");

        match parsed.scheme() {
            "s3" | "s3a" => {
                let bucket = require_host(&parsed)?;
                let endpoint = query("endpoint");
                let allow_http = endpoint
                    .as_deref()
                    .is_some_and(|e| e.starts_with("http://"));

                Ok(Self::S3 {
                    bucket,
                    region: query("region"),
                    endpoint,
                    access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                    secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                    prefix,
                    allow_http,
                })
            }
            "azure" | "az" => {
                let host = require_host(&parsed)?;
                let account_name = host.split('.').next().unwrap_or(&host).to_string();
                let container_name = parsed.path().trim_matches('/').to_string();
                if container_name.is_empty() {
                    return Err(crate::Error::Config(
                        "Azure storage URL must name a container: azure://account/container"
                            .to_string(),
                    ));
                }

                Ok(Self::Azure {
                    account_name,
                    container_name,
                    account_key: std::env::var("AZURE_STORAGE_KEY").ok(),
                    prefix,
                })
            }
            "gcs" | "gs" => Ok(Self::Gcs {
                bucket: require_host(&parsed)?,
                service_account_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
                prefix,
            }),
            "file" => Ok(Self::Filesystem {
                path: PathBuf::from(parsed.path()),
            }),
            "memory" => Ok(Self::Memory),
            scheme => Err(crate::Error::Config(format!(
                "Unknown storage scheme: {}",
                scheme
            ))),
        }
    }

    /// Short backend name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Azure { .. } => "azure",
            Self::Gcs { .. } => "gcs",
            Self::Filesystem { .. } => "filesystem",
            Self::Memory => "memory",
        }
    }
}

fn require_host(parsed: &url::Url) -> crate::Result<String> {
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(crate::Error::Config(format!(
            "Storage URL is missing a bucket or account: {}",
            parsed
        ))),
    }
}
