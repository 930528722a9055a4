//! Backup manager behaviour.
//!
//! Tests cover:
//! - Job creation: validation and defaults
//! - Backup execution: counts, stored artifacts, partial and failed runs
//! - Deletion and retention enforcement
//! - Concurrent execution of independent jobs

use chrono::Duration;

use aegis_core::archive;
use aegis_core::config::{DEFAULT_RETENTION_DAYS, DEFAULT_STORAGE_ROOT};
use aegis_core::manifest::{archive_key, manifest_key, BackupManifest};
use aegis_core::models::{BackupJobSpec, JobStatus, RecordStatus};
use aegis_core::storage::StorageBackend;
use aegis_core::Error;

use super::helpers::*;

// ============================================================================
// Job creation
// ============================================================================

#[tokio::test]
async fn create_job_applies_defaults() {
    let h = harness(prod_cluster());
    let job = h
        .backups
        .create_job(job_spec("nightly", "prod", &["Deployment"]))
        .await
        .unwrap();

    assert!(job.id.starts_with("bj-"));
    assert_eq!(job.retention_days, DEFAULT_RETENTION_DAYS);
    assert_eq!(job.storage_location, DEFAULT_STORAGE_ROOT);
    assert_eq!(job.status, JobStatus::Active);
    assert!(job.last_run.is_none());
    assert!(job.next_run.unwrap() > job.created_at);

    assert_eq!(h.backups.get_job(&job.id).await.unwrap(), job);
}

#[tokio::test]
async fn create_job_zero_retention_means_default() {
    let h = harness(vec![]);
    let job = h
        .backups
        .create_job(BackupJobSpec {
            retention_days: Some(0),
            ..job_spec("nightly", "prod", &["Deployment"])
        })
        .await
        .unwrap();
    assert_eq!(job.retention_days, DEFAULT_RETENTION_DAYS);
}

#[tokio::test]
async fn create_job_rejects_missing_fields() {
    let h = harness(vec![]);

    let cases = vec![
        job_spec("", "prod", &["Deployment"]),
        job_spec("nightly", "  ", &["Deployment"]),
        job_spec("nightly", "prod", &[]),
        job_spec("nightly", "prod", &[" "]),
        BackupJobSpec {
            schedule: String::new(),
            ..job_spec("nightly", "prod", &["Deployment"])
        },
    ];

    for spec in cases {
        let err = h.backups.create_job(spec).await.unwrap_err();
        assert!(err.is_validation(), "unexpected error: {}", err);
    }

    // nothing was stored
    assert!(h.backups.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_job_rejects_duplicate_id() {
    let h = harness(vec![]);
    let spec = BackupJobSpec {
        id: Some("bj-fixed".to_string()),
        ..job_spec("nightly", "prod", &["Deployment"])
    };

    h.backups.create_job(spec.clone()).await.unwrap();
    let err = h.backups.create_job(spec).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.backups.list_jobs().await.unwrap().len(), 1);
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn resource_count_matches_listed_resources() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment", "Service", "ConfigMap"]).await;

    // staging deployment and the unlisted Secret are not captured
    assert_eq!(record.resource_count, 4);
    assert_eq!(record.status, RecordStatus::Completed);
    assert!(record.error_message.is_none());
    assert!(record.size_bytes > 0);
    assert!(record.completed_at.is_some());
}

#[tokio::test]
async fn backup_writes_archive_and_manifest() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["deployments"]).await;

    let archive_path = archive_key(&record.job_id, &record.id);
    assert_eq!(record.storage_path, archive_path);

    let archive_bytes = h.storage.get(&archive_path).await.unwrap();
    assert_eq!(archive_bytes.len() as u64, record.size_bytes);

    let manifest_bytes = h
        .storage
        .get(&manifest_key(&record.job_id, &record.id))
        .await
        .unwrap();
    let manifest = BackupManifest::from_json(&manifest_bytes).unwrap();
    assert_eq!(manifest.backup_id, record.id);
    assert_eq!(manifest.resource_count, 2);
    assert_eq!(manifest.checksum, archive::checksum(&archive_bytes));

    let restored = h.backups.read_archive_resources(&record.id).await.unwrap();
    assert_eq!(restored, manifest.resources);
}

#[tokio::test]
async fn backup_updates_job_run_times() {
    let h = harness(prod_cluster());
    let job = h
        .backups
        .create_job(job_spec("nightly", "prod", &["Service"]))
        .await
        .unwrap();

    let record = h
        .backups
        .execute_backup(&job.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let job = h.backups.get_job(&job.id).await.unwrap();
    assert_eq!(job.last_run, record.completed_at);
    assert!(job.next_run.unwrap() > job.last_run.unwrap());
}

#[tokio::test]
async fn execute_unknown_job_is_not_found() {
    let h = harness(vec![]);
    let err = h.backups.execute_backup("bj-missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(h.backups.list_all_backups().await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_listing_failure_still_completes() {
    let h = harness(prod_cluster());
    h.cluster.fail_list("ConfigMap");

    let job = h
        .backups
        .create_job(job_spec("nightly", "prod", &["Deployment", "ConfigMap"]))
        .await
        .unwrap();
    let outcome = h.backups.execute_backup(&job.id).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.record.status, RecordStatus::Completed);
    assert_eq!(outcome.record.resource_count, 2);
    let message = outcome.record.error_message.unwrap();
    assert!(message.starts_with("partial errors:"), "{}", message);
    assert!(message.contains("ConfigMap"));
}

#[tokio::test]
async fn total_listing_failure_fails_record() {
    let h = harness(prod_cluster());
    h.cluster.fail_list("Secret");

    let job = h
        .backups
        .create_job(job_spec("secrets", "prod", &["Secret"]))
        .await
        .unwrap();
    let outcome = h.backups.execute_backup(&job.id).await.unwrap();

    assert!(!outcome.is_success());
    assert!(matches!(outcome.error, Some(Error::Execution(_))));
    assert_eq!(outcome.record.status, RecordStatus::Failed);
    assert!(outcome.record.error_message.is_some());
    assert!(outcome.record.completed_at.is_some());

    // the failed record is persisted and still counts as the job's last run
    let stored = h.backups.get_backup_record(&outcome.record.id).await.unwrap();
    assert_eq!(stored.status, RecordStatus::Failed);
    let updated = h.backups.get_job(&job.id).await.unwrap();
    assert_eq!(updated.last_run, outcome.record.completed_at);
    assert!(h
        .storage
        .list(&format!("{}/", job.id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn empty_namespace_backs_up_nothing() {
    let h = harness(prod_cluster());
    let job = h
        .backups
        .create_job(job_spec("empty", "dev", &["Deployment"]))
        .await
        .unwrap();

    let record = h
        .backups
        .execute_backup(&job.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(record.resource_count, 0);
    assert!(record.is_completed());
}

#[tokio::test]
async fn independent_jobs_run_concurrently() {
    let h = harness(prod_cluster());
    let first = h
        .backups
        .create_job(job_spec("deployments", "prod", &["Deployment"]))
        .await
        .unwrap();
    let second = h
        .backups
        .create_job(job_spec("services", "prod", &["Service"]))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.backups.execute_backup(&first.id),
        h.backups.execute_backup(&second.id)
    );
    assert_eq!(a.unwrap().into_result().unwrap().resource_count, 2);
    assert_eq!(b.unwrap().into_result().unwrap().resource_count, 1);

    assert_eq!(h.backups.list_backups(&first.id).await.unwrap().len(), 1);
    assert_eq!(h.backups.list_backups(&second.id).await.unwrap().len(), 1);
    assert_eq!(h.backups.list_all_backups().await.unwrap().len(), 2);
}

#[tokio::test]
async fn list_backups_for_unknown_job_is_not_found() {
    let h = harness(vec![]);
    assert!(h
        .backups
        .list_backups("bj-missing")
        .await
        .unwrap_err()
        .is_not_found());
}

// ============================================================================
// Deletion and retention
// ============================================================================

#[tokio::test]
async fn delete_backup_removes_record_and_storage() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    h.backups.delete_backup(&record.id).await.unwrap();

    assert!(h
        .backups
        .get_backup_record(&record.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!h
        .storage
        .exists(&archive_key(&record.job_id, &record.id))
        .await
        .unwrap());
    assert!(!h
        .storage
        .exists(&manifest_key(&record.job_id, &record.id))
        .await
        .unwrap());

    // the parent job survives
    assert!(h.backups.get_job(&record.job_id).await.is_ok());
}

#[tokio::test]
async fn delete_unknown_backup_is_not_found() {
    let h = harness(vec![]);
    let err = h.backups.delete_backup("br-missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn retention_keeps_record_at_cutoff() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let completed_at = record.completed_at.unwrap();

    // exactly retention_days after completion: the cutoff equals completed_at
    let at_cutoff = completed_at + Duration::days(DEFAULT_RETENTION_DAYS as i64);
    let deleted = h
        .backups
        .enforce_retention_at(&record.job_id, at_cutoff)
        .await
        .unwrap();
    assert_eq!(deleted, 0);
    assert!(h.backups.get_backup_record(&record.id).await.is_ok());
}

#[tokio::test]
async fn retention_deletes_record_past_cutoff() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let completed_at = record.completed_at.unwrap();

    let past_cutoff = completed_at
        + Duration::days(DEFAULT_RETENTION_DAYS as i64)
        + Duration::milliseconds(1);
    let deleted = h
        .backups
        .enforce_retention_at(&record.job_id, past_cutoff)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(h
        .backups
        .get_backup_record(&record.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(!h.storage.exists(&record.storage_path).await.unwrap());
}

#[tokio::test]
async fn retention_only_touches_its_own_job() {
    let h = harness(prod_cluster());
    let kept = completed_backup(&h, &["Service"]).await;
    let expired = completed_backup(&h, &["Deployment"]).await;

    let far_future = expired.completed_at.unwrap() + Duration::days(365);
    let deleted = h
        .backups
        .enforce_retention_at(&expired.job_id, far_future)
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert!(h.backups.get_backup_record(&kept.id).await.is_ok());
}
