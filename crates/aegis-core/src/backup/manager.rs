//! Backup manager: owns backup jobs and records.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::config::BackupOptions;
use crate::manifest::{self, BackupManifest};
use crate::models::{new_id, BackupJob, BackupJobSpec, BackupRecord, JobStatus, RecordStatus};
use crate::resource::ResourceClient;
use crate::schedule::calculate_next_run;
use crate::storage::StorageBackend;
use crate::store::JobStore;
use crate::{Error, Result};

/// Result of one backup execution.
///
/// The record is always present, even when the backup failed, so callers can
/// inspect what happened.
#[derive(Debug)]
pub struct BackupOutcome {
    pub record: BackupRecord,
    pub error: Option<Error>,
}

impl BackupOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The record if the backup completed, otherwise the error
    pub fn into_result(self) -> Result<BackupRecord> {
        match self.error {
            None => Ok(self.record),
            Some(err) => Err(err),
        }
    }
}

/// Creates jobs, executes backups and enforces retention.
///
/// Slow work (cluster listing, archive encoding, storage writes) never runs
/// while a store lock is held; store calls are short targeted reads and writes.
pub struct BackupManager {
    resources: Arc<dyn ResourceClient>,
    storage: Arc<dyn StorageBackend>,
    store: Arc<dyn JobStore>,
    options: BackupOptions,
}

impl BackupManager {
    pub fn new(
        resources: Arc<dyn ResourceClient>,
        storage: Arc<dyn StorageBackend>,
        store: Arc<dyn JobStore>,
        options: &BackupOptions,
    ) -> Self {
        Self {
            resources,
            storage,
            store,
            options: options.clone(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Validate and store a new job, computing its first run
    pub async fn create_job(&self, spec: BackupJobSpec) -> Result<BackupJob> {
        if spec.name.trim().is_empty() {
            return Err(Error::Validation("job name is required".to_string()));
        }
        if spec.namespace.trim().is_empty() {
            return Err(Error::Validation("job namespace is required".to_string()));
        }
        let resource_types: Vec<String> = spec
            .resource_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if resource_types.is_empty() {
            return Err(Error::Validation(
                "at least one resource type is required".to_string(),
            ));
        }
        if spec.schedule.trim().is_empty() {
            return Err(Error::Validation("schedule is required".to_string()));
        }

        let now = Utc::now();
        let job = BackupJob {
            id: spec
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| new_id("bj")),
            name: spec.name,
            namespace: spec.namespace,
            resource_types,
            next_run: Some(calculate_next_run(&spec.schedule, now)),
            schedule: spec.schedule,
            retention_days: spec
                .retention_days
                .filter(|days| *days > 0)
                .unwrap_or(self.options.default_retention_days),
            storage_location: spec
                .storage_location
                .filter(|loc| !loc.trim().is_empty())
                .unwrap_or_else(|| self.options.storage_root.clone()),
            status: spec.status.unwrap_or_default(),
            last_run: None,
            created_at: now,
        };

        self.store.insert_job(&job).await?;

        info!(
            job_id = %job.id,
            "Created backup job '{}' for namespace {} ({})",
            job.name,
            job.namespace,
            job.schedule
        );
        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<BackupJob> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| Error::not_found("backup job", job_id))
    }

    pub async fn list_jobs(&self) -> Result<Vec<BackupJob>> {
        self.store.list_jobs().await
    }

    /// Snapshot the job's resources into a new archive.
    ///
    /// Fails outright only when the job does not exist or the store cannot
    /// record the attempt; every other failure is reported in the outcome.
    pub async fn execute_backup(&self, job_id: &str) -> Result<BackupOutcome> {
        let job = self.get_job(job_id).await?;

        let started_at = Utc::now();
        let mut record = BackupRecord::start(&job.id, started_at);
        self.store.save_record(&record).await?;

        info!(
            job_id = %job.id,
            record_id = %record.id,
            "Starting backup of namespace {} ({} resource types)",
            job.namespace,
            job.resource_types.len()
        );

        let mut resources = Vec::new();
        let mut errors = Vec::new();
        for resource_type in &job.resource_types {
            match self
                .resources
                .list_resources(resource_type, &job.namespace)
                .await
            {
                Ok(listed) => {
                    debug!("Captured {} {}", listed.len(), resource_type);
                    resources.extend(listed);
                }
                Err(e) => {
                    let message = format!(
                        "failed to list {} in {}: {}",
                        resource_type, job.namespace, e
                    );
                    warn!(job_id = %job.id, "{}", message);
                    errors.push(message);
                }
            }
        }

        if resources.is_empty() && !errors.is_empty() {
            let message = errors.join("; ");
            return self
                .fail_record(
                    &job,
                    record,
                    message.clone(),
                    Error::Execution(format!("failed to collect any resources: {}", message)),
                )
                .await;
        }

        let mut manifest = BackupManifest::new(
            &record.id,
            &job.id,
            &job.namespace,
            job.resource_types.clone(),
            resources,
            started_at,
        );

        let (archive_bytes, checksum) = match archive::build_archive(&manifest) {
            Ok(built) => built,
            Err(e) => {
                let message = format!("failed to create archive: {}", e);
                return self.fail_record(&job, record, message, e).await;
            }
        };
        manifest.checksum = checksum;

        let archive_key = manifest::archive_key(&job.id, &record.id);
        let size_bytes = archive_bytes.len() as u64;
        if let Err(e) = self
            .storage
            .put(&archive_key, Bytes::from(archive_bytes))
            .await
        {
            let message = format!("failed to store archive: {}", e);
            return self.fail_record(&job, record, message, e).await;
        }

        // Without the manifest the archive cannot be validated or restored
        let manifest_key = manifest::manifest_key(&job.id, &record.id);
        let stored = match manifest.to_json() {
            Ok(json) => self.storage.put(&manifest_key, Bytes::from(json)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            let message = format!("failed to store manifest: {}", e);
            return self.fail_record(&job, record, message, e).await;
        }

        let completed_at = Utc::now();
        record.size_bytes = size_bytes;
        record.resource_count = manifest.resource_count;
        record.storage_path = archive_key;
        if !errors.is_empty() {
            record.error_message = Some(format!("partial errors: {}", errors.join("; ")));
        }
        record.finish(RecordStatus::Completed, completed_at);
        self.store.save_record(&record).await?;
        self.advance_schedule(&job, completed_at).await?;

        info!(
            job_id = %job.id,
            record_id = %record.id,
            "Backup completed: {} resources, {} bytes, {}ms",
            record.resource_count,
            record.size_bytes,
            record.duration_ms
        );

        Ok(BackupOutcome {
            record,
            error: None,
        })
    }

    /// A failed run still counts as a run, so the job waits for its next
    /// slot instead of being picked up again on the following tick.
    async fn fail_record(
        &self,
        job: &BackupJob,
        mut record: BackupRecord,
        message: String,
        err: Error,
    ) -> Result<BackupOutcome> {
        error!(record_id = %record.id, "Backup failed: {}", message);
        let completed_at = Utc::now();
        record.error_message = Some(message);
        record.finish(RecordStatus::Failed, completed_at);
        self.store.save_record(&record).await?;
        self.advance_schedule(job, completed_at).await?;
        Ok(BackupOutcome {
            record,
            error: Some(err),
        })
    }

    async fn advance_schedule(&self, job: &BackupJob, last_run: DateTime<Utc>) -> Result<()> {
        let next_run = calculate_next_run(&job.schedule, last_run);
        if !self
            .store
            .update_job_runs(&job.id, last_run, next_run)
            .await?
        {
            warn!(job_id = %job.id, "Job disappeared before its run times could be updated");
        }
        Ok(())
    }

    /// Records of one job, oldest first
    pub async fn list_backups(&self, job_id: &str) -> Result<Vec<BackupRecord>> {
        self.get_job(job_id).await?;
        self.store.list_records(job_id).await
    }

    pub async fn list_all_backups(&self) -> Result<Vec<BackupRecord>> {
        self.store.list_all_records().await
    }

    pub async fn get_backup_record(&self, record_id: &str) -> Result<BackupRecord> {
        self.store
            .get_record(record_id)
            .await?
            .ok_or_else(|| Error::not_found("backup record", record_id))
    }

    /// Remove a record and everything stored under it. The parent job is kept.
    pub async fn delete_backup(&self, record_id: &str) -> Result<()> {
        let record = self.get_backup_record(record_id).await?;

        let prefix = manifest::record_prefix(&record.job_id, &record.id);
        match self.storage.delete_prefix(&prefix).await {
            Ok(removed) => debug!("Removed {} stored objects under {}", removed, prefix),
            Err(e) => warn!(
                record_id = %record.id,
                "Failed to delete stored backup data under {}: {}",
                prefix,
                e
            ),
        }

        if !self.store.delete_record(&record.id).await? {
            return Err(Error::not_found("backup record", record_id));
        }

        info!(record_id = %record.id, "Deleted backup record");
        Ok(())
    }

    /// Delete the job's records that completed before `now - retention_days`
    pub async fn enforce_retention(&self, job_id: &str) -> Result<usize> {
        self.enforce_retention_at(job_id, Utc::now()).await
    }

    /// Retention against an explicit clock. A record completed exactly at the
    /// cutoff is kept.
    pub async fn enforce_retention_at(&self, job_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let job = self.get_job(job_id).await?;
        let cutoff = now - Duration::days(job.retention_days as i64);

        let expired: Vec<String> = self
            .store
            .list_records(job_id)
            .await?
            .into_iter()
            .filter(|r| r.completed_at.is_some_and(|at| at < cutoff))
            .map(|r| r.id)
            .collect();

        let mut deleted = 0;
        for record_id in &expired {
            match self.delete_backup(record_id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Retention: failed to delete {}: {}", record_id, e),
            }
        }

        info!(
            job_id = %job_id,
            "Retention enforcement deleted {}/{} expired backups (cutoff {})",
            deleted,
            expired.len(),
            cutoff
        );
        Ok(deleted)
    }

    /// Active jobs whose next run is at or before now
    pub async fn schedule_backups(&self) -> Result<Vec<BackupJob>> {
        self.schedule_backups_at(Utc::now()).await
    }

    pub async fn schedule_backups_at(&self, now: DateTime<Utc>) -> Result<Vec<BackupJob>> {
        Ok(self
            .store
            .list_jobs()
            .await?
            .into_iter()
            .filter(|job| job.status == JobStatus::Active)
            .filter(|job| job.next_run.is_some_and(|next| next <= now))
            .collect())
    }

    /// Read the manifest stored beside a backup's archive
    pub async fn load_manifest(&self, record_id: &str) -> Result<BackupManifest> {
        let record = self.get_backup_record(record_id).await?;
        let data = self
            .storage
            .get(&manifest::manifest_key(&record.job_id, &record.id))
            .await?;
        BackupManifest::from_json(&data)
    }

    /// Read a backup's raw archive bytes
    pub async fn read_archive(&self, record_id: &str) -> Result<Bytes> {
        let record = self.get_backup_record(record_id).await?;
        self.storage
            .get(&manifest::archive_key(&record.job_id, &record.id))
            .await
    }

    /// Decode the resources back out of a backup's archive
    pub async fn read_archive_resources(
        &self,
        record_id: &str,
    ) -> Result<Vec<crate::models::KubernetesResource>> {
        let data = self.read_archive(record_id).await?;
        Ok(archive::read_archive(&data)?.resources)
    }
}
