//! Aegis Core Library
//!
//! Backup and disaster recovery for cluster resources: scheduled snapshots of
//! namespaced resources into checksummed archives on durable storage, and
//! recovery plans that restore them into a target namespace under an explicit
//! conflict policy.

pub mod archive;
pub mod backup;
pub mod config;
pub mod error;
pub mod manifest;
pub mod models;
pub mod recovery;
pub mod resource;
pub mod schedule;
pub mod storage;
pub mod store;

pub use backup::{BackupManager, BackupOutcome};
pub use config::{BackupOptions, Config, SchedulerOptions, StateBackend, StateConfig};
pub use error::{Error, ResourceError, Result, StorageError};
pub use manifest::BackupManifest;
pub use models::{
    BackupJob, BackupJobSpec, BackupRecord, ConflictPolicy, ExecutionStatus, JobStatus,
    KubernetesResource, RecordStatus, RecoveryExecution, RecoveryPlan, RecoveryPlanSpec,
    RecoveryStrategy,
};
pub use recovery::{filter_resources, RecoveryManager, RecoveryOutcome, ValidationReport};
pub use resource::{KubeResourceClient, MemoryResourceClient, ResourceClient};
pub use schedule::{calculate_next_run, Schedule};
pub use storage::{create_backend, StorageBackend, StorageBackendConfig};
pub use store::{JobStore, MemoryStore, PlanStore, SqliteStore};
