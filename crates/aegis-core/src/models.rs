//! Core entities: backup jobs and records, recovery plans and executions,
//! and the snapshotted cluster resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Generate a prefixed entity id (`bj-…`, `br-…`, `rp-…`, `re-…`)
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Lifecycle state of a backup job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Active,
    Paused,
    Disabled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
            JobStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(JobStatus::Active),
            "paused" => Ok(JobStatus::Paused),
            "disabled" => Ok(JobStatus::Disabled),
            other => Err(Error::Validation(format!("unknown job status: {}", other))),
        }
    }
}

/// State of a single backup execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Running => "running",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RecordStatus::Pending),
            "running" => Ok(RecordStatus::Running),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(Error::Validation(format!("unknown record status: {}", other))),
        }
    }
}

/// How restored resources are placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    #[default]
    InPlace,
    NewNamespace,
    CrossCluster,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::InPlace => "in_place",
            RecoveryStrategy::NewNamespace => "new_namespace",
            RecoveryStrategy::CrossCluster => "cross_cluster",
        }
    }
}

impl FromStr for RecoveryStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "in_place" => Ok(RecoveryStrategy::InPlace),
            "new_namespace" => Ok(RecoveryStrategy::NewNamespace),
            "cross_cluster" => Ok(RecoveryStrategy::CrossCluster),
            other => Err(Error::Validation(format!(
                "unknown recovery strategy: {}",
                other
            ))),
        }
    }
}

/// What to do when a restored resource already exists in the target namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Skip,
    Overwrite,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Overwrite => "overwrite",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            other => Err(Error::Validation(format!(
                "unknown conflict policy: {}",
                other
            ))),
        }
    }
}

/// State of a recovery plan or execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Partial => "partial",
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "partial" => Ok(ExecutionStatus::Partial),
            other => Err(Error::Validation(format!(
                "unknown execution status: {}",
                other
            ))),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    JobStatus,
    RecordStatus,
    RecoveryStrategy,
    ConflictPolicy,
    ExecutionStatus
);

/// A reusable backup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: String,
    pub name: String,
    /// Namespace whose resources are captured
    pub namespace: String,
    /// Resource types to capture (e.g. `Deployment`, `configmaps`)
    pub resource_types: Vec<String>,
    /// Schedule expression, see [`crate::schedule`]
    pub schedule: String,
    pub retention_days: u32,
    pub storage_location: String,
    pub status: JobStatus,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a [`BackupJob`]. Unset optional fields receive manager defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupJobSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub resource_types: Vec<String>,
    pub schedule: String,
    #[serde(default)]
    pub retention_days: Option<u32>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
}

/// One execution of a backup job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub job_id: String,
    pub status: RecordStatus,
    pub size_bytes: u64,
    pub duration_ms: u64,
    pub resource_count: usize,
    pub storage_path: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BackupRecord {
    /// A freshly started record in the running state
    pub fn start(job_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id("br"),
            job_id: job_id.to_string(),
            status: RecordStatus::Running,
            size_bytes: 0,
            duration_ms: 0,
            resource_count: 0,
            storage_path: String::new(),
            error_message: None,
            started_at,
            completed_at: None,
        }
    }

    /// Move to a terminal status, stamping completion time and duration
    pub fn finish(&mut self, status: RecordStatus, completed_at: DateTime<Utc>) {
        self.status = status;
        self.completed_at = Some(completed_at);
        self.duration_ms = (completed_at - self.started_at).num_milliseconds().max(0) as u64;
    }

    pub fn is_completed(&self) -> bool {
        self.status == RecordStatus::Completed
    }
}

/// One snapshotted cluster object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesResource {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Full object manifest (JSON bytes), base64 in serialized form
    #[serde(default, with = "bytes_base64")]
    pub manifest: Vec<u8>,
}

impl KubernetesResource {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            manifest: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_manifest(mut self, manifest: Vec<u8>) -> Self {
        self.manifest = manifest;
        self
    }

    /// `Kind/namespace/name`, used in logs and error messages
    pub fn display_name(&self) -> String {
        format!("{}/{}/{}", self.kind, self.namespace, self.name)
    }

    /// Copy of this resource rewritten into `namespace`.
    ///
    /// When the payload is a JSON object its `metadata.namespace` is
    /// rewritten too, so the applied object matches the declared target.
    pub fn retarget(&self, namespace: &str) -> Result<Self> {
        let mut target = self.clone();
        target.namespace = namespace.to_string();

        if target.manifest.is_empty() {
            return Ok(target);
        }

        let mut payload: serde_json::Value = serde_json::from_slice(&target.manifest)
            .map_err(|e| {
                Error::Integrity(format!(
                    "failed to deserialize payload of {}: {}",
                    self.display_name(),
                    e
                ))
            })?;

        if let Some(object) = payload.as_object_mut() {
            let metadata = object
                .entry("metadata")
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
            if let Some(metadata) = metadata.as_object_mut() {
                metadata.insert(
                    "namespace".to_string(),
                    serde_json::Value::String(namespace.to_string()),
                );
            }
            target.manifest = serde_json::to_vec(&payload)?;
        }

        Ok(target)
    }
}

/// Serde helper for byte arrays (base64 encoded)
mod bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A declared intent to restore a backup into a target namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub backup_id: String,
    pub target_namespace: String,
    /// Kinds to restore; empty means everything in the backup
    #[serde(default)]
    pub resource_filters: Vec<String>,
    pub strategy: RecoveryStrategy,
    pub conflict_policy: ConflictPolicy,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
}

/// Request to create a [`RecoveryPlan`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryPlanSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub backup_id: String,
    pub target_namespace: String,
    #[serde(default)]
    pub resource_filters: Vec<String>,
    #[serde(default)]
    pub strategy: Option<RecoveryStrategy>,
    #[serde(default)]
    pub conflict_policy: Option<ConflictPolicy>,
}

/// One attempt to run a recovery plan, real or simulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryExecution {
    pub id: String,
    pub plan_id: String,
    pub status: ExecutionStatus,
    pub dry_run: bool,
    pub resources_restored: usize,
    pub resources_skipped: usize,
    #[serde(default)]
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecoveryExecution {
    pub fn start(plan_id: &str, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id("re"),
            plan_id: plan_id.to_string(),
            status: ExecutionStatus::Running,
            dry_run,
            resources_restored: 0,
            resources_skipped: 0,
            errors: Vec::new(),
            started_at,
            completed_at: None,
        }
    }
}
