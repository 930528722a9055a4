//! Scheduling behaviour across the backup manager.
//!
//! Tests cover:
//! - Next-run computation at job creation
//! - Due-job selection by status and next run time
//! - Failed runs advancing the schedule

use chrono::{Duration, Utc};

use aegis_core::models::{BackupJobSpec, JobStatus};
use aegis_core::schedule::Schedule;
use aegis_core::store::JobStore;

use super::helpers::*;

#[tokio::test]
async fn new_job_next_run_follows_schedule() {
    let h = harness(vec![]);
    let before = Utc::now();
    let job = h
        .backups
        .create_job(BackupJobSpec {
            schedule: "*/15 * * * *".to_string(),
            ..job_spec("frequent", "prod", &["Deployment"])
        })
        .await
        .unwrap();

    let next = job.next_run.unwrap();
    assert_eq!(next, job.created_at + Duration::minutes(15));
    assert!(next > before);
}

#[tokio::test]
async fn unrecognized_schedule_runs_in_an_hour() {
    let h = harness(vec![]);
    let job = h
        .backups
        .create_job(BackupJobSpec {
            schedule: "0 3 * * 1-5".to_string(),
            ..job_spec("weekdays", "prod", &["Deployment"])
        })
        .await
        .unwrap();

    assert!(!Schedule::parse(&job.schedule).is_recognized());
    assert_eq!(job.next_run.unwrap(), job.created_at + Duration::hours(1));
}

#[tokio::test]
async fn due_jobs_are_active_and_past_next_run() {
    let h = harness(vec![]);
    let active = h
        .backups
        .create_job(job_spec("active", "prod", &["Deployment"]))
        .await
        .unwrap();
    let paused = h
        .backups
        .create_job(BackupJobSpec {
            status: Some(JobStatus::Paused),
            ..job_spec("paused", "prod", &["Deployment"])
        })
        .await
        .unwrap();
    h.backups
        .create_job(BackupJobSpec {
            status: Some(JobStatus::Disabled),
            ..job_spec("disabled", "prod", &["Deployment"])
        })
        .await
        .unwrap();

    // nothing is due right after creation
    assert!(h.backups.schedule_backups().await.unwrap().is_empty());

    // a job is due exactly at its next run
    let due = h
        .backups
        .schedule_backups_at(active.next_run.unwrap())
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, active.id);

    // paused and disabled jobs are never due
    let later = paused.next_run.unwrap() + Duration::days(30);
    let due = h.backups.schedule_backups_at(later).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, active.id);
}

#[tokio::test]
async fn running_a_job_moves_it_out_of_the_due_set() {
    let h = harness(prod_cluster());
    let job = h
        .backups
        .create_job(BackupJobSpec {
            schedule: "@hourly".to_string(),
            ..job_spec("hourly", "prod", &["Deployment"])
        })
        .await
        .unwrap();

    let first_due = job.next_run.unwrap();
    h.backups.execute_backup(&job.id).await.unwrap();

    let updated = h.backups.get_job(&job.id).await.unwrap();
    let next = updated.next_run.unwrap();
    assert!(next > updated.last_run.unwrap());
    assert!(h
        .backups
        .schedule_backups_at(next - Duration::seconds(1))
        .await
        .unwrap()
        .is_empty());
    assert!(next >= first_due);
}

#[tokio::test]
async fn failed_run_waits_for_its_next_slot() {
    let h = harness(prod_cluster());
    h.cluster.fail_list("Secret");
    let job = h
        .backups
        .create_job(BackupJobSpec {
            schedule: "*/5 * * * *".to_string(),
            ..job_spec("secrets", "prod", &["Secret"])
        })
        .await
        .unwrap();
    let sibling = h
        .backups
        .create_job(job_spec("deployments", "prod", &["Deployment"]))
        .await
        .unwrap();

    let first_due = job.next_run.unwrap();
    let outcome = h.backups.execute_backup(&job.id).await.unwrap();
    assert!(!outcome.is_success());

    let updated = h.store.get_job(&job.id).await.unwrap().unwrap();
    let last_run = updated.last_run.unwrap();
    let next = updated.next_run.unwrap();
    assert_eq!(Some(last_run), outcome.record.completed_at);
    assert!(next > last_run);
    assert!(next >= first_due);

    // a tick just before the new slot does not pick the failed job up again
    let due = h
        .backups
        .schedule_backups_at(next - Duration::seconds(1))
        .await
        .unwrap();
    assert!(due.iter().all(|j| j.id != job.id));

    // the sibling job's run times are untouched
    let other = h.store.get_job(&sibling.id).await.unwrap().unwrap();
    assert!(other.last_run.is_none());
    assert_eq!(other.next_run, sibling.next_run);
}
