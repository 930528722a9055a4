//! Persistence for jobs, records, plans and executions.
//!
//! Managers never hold a store lock across a resource or storage call: every
//! store method is a single short read or targeted write.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{BackupJob, BackupRecord, RecoveryExecution, RecoveryPlan};
use crate::Result;

/// Backup jobs and their records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Store a new job. Fails with a validation error if the id is taken.
    async fn insert_job(&self, job: &BackupJob) -> Result<()>;

    async fn get_job(&self, job_id: &str) -> Result<Option<BackupJob>>;

    /// All jobs, oldest first
    async fn list_jobs(&self) -> Result<Vec<BackupJob>>;

    /// Update one job's run timestamps. Returns false if the job is gone.
    async fn update_job_runs(
        &self,
        job_id: &str,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<bool>;

    /// Insert or replace a record by id
    async fn save_record(&self, record: &BackupRecord) -> Result<()>;

    async fn get_record(&self, record_id: &str) -> Result<Option<BackupRecord>>;

    /// Records of one job in creation order
    async fn list_records(&self, job_id: &str) -> Result<Vec<BackupRecord>>;

    /// Records of every job in creation order
    async fn list_all_records(&self) -> Result<Vec<BackupRecord>>;

    /// Remove a record. Returns false if it did not exist.
    async fn delete_record(&self, record_id: &str) -> Result<bool>;
}

/// Recovery plans and their execution history
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Store a new plan. Fails with a validation error if the id is taken.
    async fn insert_plan(&self, plan: &RecoveryPlan) -> Result<()>;

    async fn get_plan(&self, plan_id: &str) -> Result<Option<RecoveryPlan>>;

    /// All plans, oldest first
    async fn list_plans(&self) -> Result<Vec<RecoveryPlan>>;

    /// Insert or replace an execution by id
    async fn save_execution(&self, execution: &RecoveryExecution) -> Result<()>;

    /// Executions of one plan, oldest first
    async fn list_executions(&self, plan_id: &str) -> Result<Vec<RecoveryExecution>>;
}
