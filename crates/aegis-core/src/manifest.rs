//! Backup manifest and storage key layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::KubernetesResource;
use crate::{Error, Result};

/// File name of the manifest, both inside the archive and beside it in storage
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata describing one archive's contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    /// Id of the backup record that produced this archive
    pub backup_id: String,

    pub job_id: String,

    pub namespace: String,

    /// Resource types the job was configured to capture
    #[serde(default)]
    pub resource_types: Vec<String>,

    /// Every captured resource, in capture order
    #[serde(default)]
    pub resources: Vec<KubernetesResource>,

    pub resource_count: usize,

    pub created_at: DateTime<Utc>,

    /// SHA-256 (hex) of the archive bytes. Empty inside the archive itself.
    #[serde(default)]
    pub checksum: String,
}

impl BackupManifest {
    pub fn new(
        backup_id: &str,
        job_id: &str,
        namespace: &str,
        resource_types: Vec<String>,
        resources: Vec<KubernetesResource>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            backup_id: backup_id.to_string(),
            job_id: job_id.to_string(),
            namespace: namespace.to_string(),
            resource_types,
            resource_count: resources.len(),
            resources,
            created_at,
            checksum: String::new(),
        }
    }

    /// Check the manifest's internal consistency: the declared count matches
    /// the resource list and every resource carries a kind and a name.
    pub fn verify_structure(&self) -> Result<()> {
        if self.resource_count != self.resources.len() {
            return Err(Error::Integrity(format!(
                "resource count mismatch: manifest declares {}, found {}",
                self.resource_count,
                self.resources.len()
            )));
        }

        for (i, resource) in self.resources.iter().enumerate() {
            if resource.kind.trim().is_empty() {
                return Err(Error::Integrity(format!(
                    "resource {} has an empty kind",
                    i
                )));
            }
            if resource.name.trim().is_empty() {
                return Err(Error::Integrity(format!(
                    "resource {} ({}) has an empty name",
                    i, resource.kind
                )));
            }
        }

        Ok(())
    }

    /// Total size of all resource payloads
    pub fn payload_bytes(&self) -> usize {
        self.resources.iter().map(|r| r.manifest.len()).sum()
    }

    /// Resource count per kind, sorted by kind
    pub fn kind_counts(&self) -> Vec<(String, usize)> {
        let mut counts = std::collections::BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.kind.clone()).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::Integrity(format!("malformed manifest: {}", e)))
    }
}

/// `<job_id>/<record_id>/`: everything stored for one backup
pub fn record_prefix(job_id: &str, record_id: &str) -> String {
    format!("{}/{}/", job_id, record_id)
}

/// `<job_id>/<record_id>/<record_id>.tar.gz`
pub fn archive_key(job_id: &str, record_id: &str) -> String {
    format!("{}/{}/{}.tar.gz", job_id, record_id, record_id)
}

/// `<job_id>/<record_id>/manifest.json`
pub fn manifest_key(job_id: &str, record_id: &str) -> String {
    format!("{}/{}/{}", job_id, record_id, MANIFEST_FILE)
}
