//! Recovery manager behaviour.
//!
//! Tests cover:
//! - Plan creation: validation, defaults, backup state checks
//! - Execution and dry-run parity
//! - Conflict policies, namespace retargeting and resource filters
//! - Partial and failed executions, cancellation
//! - Backup validation against tampered storage

use tokio_util::sync::CancellationToken;

use aegis_core::manifest::{archive_key, manifest_key, BackupManifest};
use aegis_core::models::{
    ConflictPolicy, ExecutionStatus, RecoveryPlanSpec, RecoveryStrategy,
};
use aegis_core::storage::StorageBackend;
use aegis_core::Error;

use super::helpers::*;

// ============================================================================
// Plan creation
// ============================================================================

#[tokio::test]
async fn create_plan_applies_defaults() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    assert!(plan.id.starts_with("rp-"));
    assert_eq!(plan.strategy, RecoveryStrategy::InPlace);
    assert_eq!(plan.conflict_policy, ConflictPolicy::Skip);
    assert_eq!(plan.status, ExecutionStatus::Pending);
    assert_eq!(h.recovery.get_plan(&plan.id).await.unwrap(), plan);
    assert_eq!(h.recovery.list_plans().await.unwrap().len(), 1);
}

#[tokio::test]
async fn create_plan_rejects_missing_fields() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    let cases = vec![
        RecoveryPlanSpec {
            name: String::new(),
            ..plan_spec(&record.id, "restored")
        },
        plan_spec("", "restored"),
        plan_spec(&record.id, " "),
    ];

    for spec in cases {
        let err = h.recovery.create_plan(spec).await.unwrap_err();
        assert!(err.is_validation(), "unexpected error: {}", err);
    }
    assert!(h.recovery.list_plans().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_plan_rejects_unknown_backup() {
    let h = harness(vec![]);
    let err = h
        .recovery
        .create_plan(plan_spec("br-missing", "restored"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn create_plan_rejects_failed_backup() {
    let h = harness(prod_cluster());
    h.cluster.fail_list("Secret");
    let job = h
        .backups
        .create_job(job_spec("secrets", "prod", &["Secret"]))
        .await
        .unwrap();
    let failed = h.backups.execute_backup(&job.id).await.unwrap().record;

    let err = h
        .recovery
        .create_plan(plan_spec(&failed.id, "restored"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("not in completed state"));
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn dry_run_matches_execution_without_applying() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment", "Service", "ConfigMap"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    let dry = h
        .recovery
        .dry_run(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert!(dry.dry_run);
    assert_eq!(h.cluster.apply_count(), 0);

    let real = h
        .recovery
        .execute_recovery(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert!(!real.dry_run);

    assert_eq!(dry.resources_restored, real.resources_restored);
    assert_eq!(dry.resources_skipped, real.resources_skipped);
    assert_eq!(real.resources_restored, 4);
    assert_eq!(real.status, ExecutionStatus::Completed);
    assert_eq!(h.cluster.apply_count(), 4);
}

#[tokio::test]
async fn restored_resources_land_in_target_namespace() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    h.recovery.execute_recovery(&plan.id).await.unwrap();

    let restored = h.cluster.get("Deployment", "web", "restored").unwrap();
    assert_eq!(restored.namespace, "restored");
    let payload: serde_json::Value = serde_json::from_slice(&restored.manifest).unwrap();
    assert_eq!(payload["metadata"]["namespace"], "restored");
    assert_eq!(payload["metadata"]["name"], "web");

    // the source namespace is untouched
    assert!(h.cluster.get("Deployment", "web", "prod").is_some());
}

#[tokio::test]
async fn skip_policy_leaves_existing_resources() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    h.cluster.insert(deployment("web", "restored"));

    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();
    let execution = h
        .recovery
        .execute_recovery(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.resources_skipped, 1);
    assert_eq!(execution.resources_restored, 1);
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(h.cluster.apply_count(), 1);
}

#[tokio::test]
async fn overwrite_policy_reapplies_existing_resources() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    // recovering in place: everything already exists
    let plan = h
        .recovery
        .create_plan(RecoveryPlanSpec {
            conflict_policy: Some(ConflictPolicy::Overwrite),
            ..plan_spec(&record.id, "prod")
        })
        .await
        .unwrap();
    let execution = h
        .recovery
        .execute_recovery(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.resources_restored, 2);
    assert_eq!(execution.resources_skipped, 0);
    assert_eq!(h.cluster.apply_count(), 2);
}

#[tokio::test]
async fn filters_select_kinds_case_insensitively() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment", "Service", "ConfigMap"]).await;

    let plan = h
        .recovery
        .create_plan(RecoveryPlanSpec {
            resource_filters: vec!["service".to_string(), "CONFIGMAP".to_string()],
            ..plan_spec(&record.id, "restored")
        })
        .await
        .unwrap();
    let execution = h
        .recovery
        .execute_recovery(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.resources_restored, 2);
    assert!(h.cluster.get("Deployment", "web", "restored").is_none());
    assert!(h.cluster.get("Service", "web", "restored").is_some());
}

#[tokio::test]
async fn unmatched_filters_complete_with_nothing_restored() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    let plan = h
        .recovery
        .create_plan(RecoveryPlanSpec {
            resource_filters: vec!["Ingress".to_string()],
            ..plan_spec(&record.id, "restored")
        })
        .await
        .unwrap();
    let execution = h
        .recovery
        .execute_recovery(&plan.id)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.resources_restored, 0);
    assert_eq!(execution.resources_skipped, 0);
    assert!(execution.errors.is_empty());
    assert_eq!(h.cluster.apply_count(), 0);
}

#[tokio::test]
async fn some_apply_failures_give_partial_status() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    h.cluster.fail_apply("Deployment", "worker");

    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();
    let outcome = h.recovery.execute_recovery(&plan.id).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.execution.status, ExecutionStatus::Partial);
    assert_eq!(outcome.execution.resources_restored, 1);
    assert_eq!(outcome.execution.errors.len(), 1);
    assert!(outcome.execution.errors[0].contains("worker"));
}

#[tokio::test]
async fn all_apply_failures_give_failed_status() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Service"]).await;
    h.cluster.fail_apply("Service", "web");

    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();
    let outcome = h.recovery.execute_recovery(&plan.id).await.unwrap();

    assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
    assert_eq!(outcome.execution.resources_restored, 0);
    assert!(matches!(outcome.error, Some(Error::Execution(_))));
    assert!(outcome.execution.completed_at.is_some());
}

#[tokio::test]
async fn missing_backup_data_fails_execution() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    h.storage
        .delete(&manifest_key(&record.job_id, &record.id))
        .await
        .unwrap();

    let outcome = h.recovery.execute_recovery(&plan.id).await.unwrap();
    assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
    assert!(outcome.execution.errors[0].contains("manifest"));
    assert_eq!(h.cluster.apply_count(), 0);
}

#[tokio::test]
async fn cancelled_execution_is_failed_and_recorded() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = h
        .recovery
        .execute_recovery_with_cancel(&plan.id, &cancel)
        .await
        .unwrap();

    assert!(matches!(outcome.error, Some(Error::Cancelled)));
    assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
    assert_eq!(outcome.execution.resources_restored, 0);
    assert!(outcome
        .execution
        .errors
        .contains(&"recovery cancelled".to_string()));
    assert_eq!(h.cluster.apply_count(), 0);

    let history = h.recovery.list_executions(&plan.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn shutdown_cancels_new_executions() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    h.recovery.shutdown();
    assert!(h.recovery.shutdown_token().is_cancelled());

    let outcome = h.recovery.dry_run(&plan.id).await.unwrap();
    assert!(matches!(outcome.error, Some(Error::Cancelled)));
}

#[tokio::test]
async fn execution_history_is_kept_in_order() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    let dry = h.recovery.dry_run(&plan.id).await.unwrap().execution;
    let real = h.recovery.execute_recovery(&plan.id).await.unwrap().execution;

    let history = h.recovery.list_executions(&plan.id).await.unwrap();
    assert_eq!(history, vec![dry, real]);
}

#[tokio::test]
async fn unknown_plan_is_not_found() {
    let h = harness(vec![]);
    assert!(h
        .recovery
        .execute_recovery("rp-missing")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(h
        .recovery
        .list_executions("rp-missing")
        .await
        .unwrap_err()
        .is_not_found());
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn fresh_backup_validates() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment", "Service", "ConfigMap"]).await;

    let report = h.recovery.validate_backup(&record.id).await.unwrap();
    assert_eq!(report.backup_id, record.id);
    assert_eq!(report.resource_count, 4);
    assert_eq!(report.archive_bytes as u64, record.size_bytes);
}

#[tokio::test]
async fn validating_unknown_backup_is_not_found() {
    let h = harness(vec![]);
    let err = h.recovery.validate_backup("br-missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn tampered_archive_fails_validation() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    let key = archive_key(&record.job_id, &record.id);
    let mut data = h.storage.get(&key).await.unwrap().to_vec();
    data.push(0);
    overwrite(&h, &key, data).await;

    let err = h.recovery.validate_backup(&record.id).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)), "unexpected error: {}", err);
}

#[tokio::test]
async fn inconsistent_manifest_fails_validation() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    // checksum still matches, but the declared count does not
    let key = manifest_key(&record.job_id, &record.id);
    let mut manifest = BackupManifest::from_json(&h.storage.get(&key).await.unwrap()).unwrap();
    manifest.resource_count += 1;
    overwrite(&h, &key, manifest.to_json().unwrap()).await;

    let err = h.recovery.validate_backup(&record.id).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)), "unexpected error: {}", err);
}

#[tokio::test]
async fn sidecar_tamper_fails_validation() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    // checksum and count untouched, only a payload differs from the archive
    let key = manifest_key(&record.job_id, &record.id);
    let mut manifest = BackupManifest::from_json(&h.storage.get(&key).await.unwrap()).unwrap();
    manifest.resources[0].manifest = br#"{"spec":{"image":"evil"}}"#.to_vec();
    overwrite(&h, &key, manifest.to_json().unwrap()).await;

    let err = h.recovery.validate_backup(&record.id).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)), "unexpected error: {}", err);
}

#[tokio::test]
async fn tampered_sidecar_is_never_applied() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;
    let plan = h
        .recovery
        .create_plan(plan_spec(&record.id, "restored"))
        .await
        .unwrap();

    let key = manifest_key(&record.job_id, &record.id);
    let mut manifest = BackupManifest::from_json(&h.storage.get(&key).await.unwrap()).unwrap();
    manifest.resources[0].manifest = br#"{"spec":{"image":"evil"}}"#.to_vec();
    overwrite(&h, &key, manifest.to_json().unwrap()).await;

    let outcome = h.recovery.execute_recovery(&plan.id).await.unwrap();
    assert_eq!(outcome.execution.status, ExecutionStatus::Failed);
    assert!(outcome.execution.errors[0].contains("differ from its archive"));
    assert_eq!(h.cluster.apply_count(), 0);
    assert!(h.cluster.get("Deployment", "web", "restored").is_none());
}

#[tokio::test]
async fn missing_checksum_fails_validation() {
    let h = harness(prod_cluster());
    let record = completed_backup(&h, &["Deployment"]).await;

    let key = manifest_key(&record.job_id, &record.id);
    let mut manifest = BackupManifest::from_json(&h.storage.get(&key).await.unwrap()).unwrap();
    manifest.checksum.clear();
    overwrite(&h, &key, manifest.to_json().unwrap()).await;

    let err = h.recovery.validate_backup(&record.id).await.unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}

#[tokio::test]
async fn failed_backup_cannot_be_validated() {
    let h = harness(prod_cluster());
    h.cluster.fail_list("Secret");
    let job = h
        .backups
        .create_job(job_spec("secrets", "prod", &["Secret"]))
        .await
        .unwrap();
    let failed = h.backups.execute_backup(&job.id).await.unwrap().record;

    let err = h.recovery.validate_backup(&failed.id).await.unwrap_err();
    assert!(err.is_validation());
}
