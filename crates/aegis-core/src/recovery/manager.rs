//! Recovery manager: owns recovery plans and their execution history.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::backup::BackupManager;
use crate::models::{
    new_id, ConflictPolicy, ExecutionStatus, KubernetesResource, RecoveryExecution, RecoveryPlan,
    RecoveryPlanSpec,
};
use crate::resource::ResourceClient;
use crate::store::PlanStore;
use crate::{Error, Result};

/// Result of one recovery execution or dry run.
///
/// The execution is always returned, including when it failed or was
/// cancelled.
#[derive(Debug)]
pub struct RecoveryOutcome {
    pub execution: RecoveryExecution,
    pub error: Option<Error>,
}

impl RecoveryOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<RecoveryExecution> {
        match self.error {
            None => Ok(self.execution),
            Some(err) => Err(err),
        }
    }
}

/// Summary of a successful backup validation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub backup_id: String,
    pub resource_count: usize,
    pub archive_bytes: usize,
    pub checksum: String,
}

struct VerifiedBackup {
    resources: Vec<KubernetesResource>,
    archive_bytes: usize,
    checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    Apply,
    DryRun,
}

impl ExecutionMode {
    fn label(self) -> &'static str {
        match self {
            ExecutionMode::Apply => "execution",
            ExecutionMode::DryRun => "dry-run",
        }
    }
}

/// Creates plans, runs them against the cluster and validates backups
pub struct RecoveryManager {
    resources: Arc<dyn ResourceClient>,
    backups: Arc<BackupManager>,
    store: Arc<dyn PlanStore>,
    shutdown: CancellationToken,
}

impl RecoveryManager {
    pub fn new(
        resources: Arc<dyn ResourceClient>,
        backups: Arc<BackupManager>,
        store: Arc<dyn PlanStore>,
    ) -> Self {
        Self {
            resources,
            backups,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token observed by `execute_recovery` and `dry_run`
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal every running execution to stop after its current resource
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Validate and store a plan against an existing, completed backup
    pub async fn create_plan(&self, spec: RecoveryPlanSpec) -> Result<RecoveryPlan> {
        if spec.name.trim().is_empty() {
            return Err(Error::Validation("plan name is required".to_string()));
        }
        if spec.backup_id.trim().is_empty() {
            return Err(Error::Validation("backup_id is required".to_string()));
        }
        if spec.target_namespace.trim().is_empty() {
            return Err(Error::Validation("target_namespace is required".to_string()));
        }

        let record = match self.backups.get_backup_record(&spec.backup_id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                return Err(Error::Validation(format!(
                    "referenced backup {} does not exist",
                    spec.backup_id
                )))
            }
            Err(e) => return Err(e),
        };
        if !record.is_completed() {
            return Err(Error::Validation(format!(
                "backup {} is not in completed state (current: {})",
                spec.backup_id, record.status
            )));
        }

        let plan = RecoveryPlan {
            id: spec
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| new_id("rp")),
            name: spec.name,
            description: spec.description,
            backup_id: spec.backup_id,
            target_namespace: spec.target_namespace,
            resource_filters: spec.resource_filters,
            strategy: spec.strategy.unwrap_or_default(),
            conflict_policy: spec.conflict_policy.unwrap_or_default(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
        };

        self.store.insert_plan(&plan).await?;

        info!(
            plan_id = %plan.id,
            "Created recovery plan '{}' targeting {} from backup {}",
            plan.name,
            plan.target_namespace,
            plan.backup_id
        );
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: &str) -> Result<RecoveryPlan> {
        self.store
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| Error::not_found("recovery plan", plan_id))
    }

    pub async fn list_plans(&self) -> Result<Vec<RecoveryPlan>> {
        self.store.list_plans().await
    }

    /// Restore the plan's resources into its target namespace
    pub async fn execute_recovery(&self, plan_id: &str) -> Result<RecoveryOutcome> {
        let cancel = self.shutdown.clone();
        self.run_plan(plan_id, ExecutionMode::Apply, &cancel).await
    }

    /// Same as [`execute_recovery`](Self::execute_recovery) without applying anything
    pub async fn dry_run(&self, plan_id: &str) -> Result<RecoveryOutcome> {
        let cancel = self.shutdown.clone();
        self.run_plan(plan_id, ExecutionMode::DryRun, &cancel).await
    }

    pub async fn execute_recovery_with_cancel(
        &self,
        plan_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RecoveryOutcome> {
        self.run_plan(plan_id, ExecutionMode::Apply, cancel).await
    }

    pub async fn dry_run_with_cancel(
        &self,
        plan_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RecoveryOutcome> {
        self.run_plan(plan_id, ExecutionMode::DryRun, cancel).await
    }

    async fn run_plan(
        &self,
        plan_id: &str,
        mode: ExecutionMode,
        cancel: &CancellationToken,
    ) -> Result<RecoveryOutcome> {
        let plan = self.get_plan(plan_id).await?;

        let mut execution =
            RecoveryExecution::start(&plan.id, mode == ExecutionMode::DryRun, Utc::now());
        self.store.save_execution(&execution).await?;

        info!(
            plan_id = %plan.id,
            execution_id = %execution.id,
            "Starting recovery {} of backup {} into {}",
            mode.label(),
            plan.backup_id,
            plan.target_namespace
        );

        let backup = match self.load_verified(&plan.backup_id).await {
            Ok(backup) => backup,
            Err(e) => {
                execution
                    .errors
                    .push(format!("failed to load backup {}: {}", plan.backup_id, e));
                return self.finish_execution(execution, mode).await;
            }
        };

        // Restore what the checksummed archive holds, not the sidecar copy
        let matched = filter_resources(&backup.resources, &plan.resource_filters);
        if matched.is_empty() {
            info!(
                execution_id = %execution.id,
                "No resources matched the plan's filters"
            );
            return self.finish_execution(execution, mode).await;
        }

        for resource in &matched {
            if cancel.is_cancelled() {
                warn!(execution_id = %execution.id, "Recovery cancelled");
                execution.errors.push("recovery cancelled".to_string());
                return self.finish_cancelled(execution).await;
            }

            self.restore_one(&plan, resource, mode, &mut execution).await;
        }

        self.finish_execution(execution, mode).await
    }

    /// Process one resource, updating the execution's counters or error list
    async fn restore_one(
        &self,
        plan: &RecoveryPlan,
        resource: &KubernetesResource,
        mode: ExecutionMode,
        execution: &mut RecoveryExecution,
    ) {
        let target = match resource.retarget(&plan.target_namespace) {
            Ok(target) => target,
            Err(e) => {
                execution.errors.push(format!(
                    "failed to rehydrate {}: {}",
                    resource.display_name(),
                    e
                ));
                return;
            }
        };

        let exists = match self
            .resources
            .resource_exists(&target.kind, &target.name, &target.namespace)
            .await
        {
            Ok(exists) => exists,
            Err(e) => {
                execution.errors.push(format!(
                    "failed to check existence of {}: {}",
                    target.display_name(),
                    e
                ));
                return;
            }
        };

        if exists {
            match plan.conflict_policy {
                ConflictPolicy::Skip => {
                    info!("Skipping existing resource {}", target.display_name());
                    execution.resources_skipped += 1;
                    return;
                }
                ConflictPolicy::Overwrite => {
                    info!("Overwriting existing resource {}", target.display_name());
                }
            }
        }

        if mode == ExecutionMode::DryRun {
            debug!("[dry-run] would apply {}", target.display_name());
            execution.resources_restored += 1;
            return;
        }

        match self.resources.apply_resource(&target).await {
            Ok(()) => {
                execution.resources_restored += 1;
                info!("Restored {}", target.display_name());
            }
            Err(e) => {
                let message = format!("failed to apply {}: {}", target.display_name(), e);
                error!("{}", message);
                execution.errors.push(message);
            }
        }
    }

    async fn finish_execution(
        &self,
        mut execution: RecoveryExecution,
        mode: ExecutionMode,
    ) -> Result<RecoveryOutcome> {
        execution.status = if execution.errors.is_empty() {
            ExecutionStatus::Completed
        } else if execution.resources_restored == 0 {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Partial
        };
        execution.completed_at = Some(Utc::now());
        self.store.save_execution(&execution).await?;

        info!(
            execution_id = %execution.id,
            "Recovery {} {}: {} restored, {} skipped, {} errors",
            mode.label(),
            execution.status,
            execution.resources_restored,
            execution.resources_skipped,
            execution.errors.len()
        );

        let error = (execution.status == ExecutionStatus::Failed).then(|| {
            Error::Execution(format!(
                "recovery {} failed: {}",
                execution.id,
                execution.errors.join("; ")
            ))
        });
        Ok(RecoveryOutcome { execution, error })
    }

    async fn finish_cancelled(&self, mut execution: RecoveryExecution) -> Result<RecoveryOutcome> {
        execution.status = ExecutionStatus::Failed;
        execution.completed_at = Some(Utc::now());
        self.store.save_execution(&execution).await?;
        Ok(RecoveryOutcome {
            execution,
            error: Some(Error::Cancelled),
        })
    }

    /// Verify a backup's stored archive against its manifest
    pub async fn validate_backup(&self, backup_id: &str) -> Result<ValidationReport> {
        let record = self.backups.get_backup_record(backup_id).await?;
        if !record.is_completed() {
            return Err(Error::Validation(format!(
                "backup {} is not completed (status: {})",
                backup_id, record.status
            )));
        }

        let backup = self.load_verified(backup_id).await?;

        info!(
            "Backup {} validated: {} resources, checksum OK",
            backup_id,
            backup.resources.len()
        );
        Ok(ValidationReport {
            backup_id: backup_id.to_string(),
            resource_count: backup.resources.len(),
            archive_bytes: backup.archive_bytes,
            checksum: backup.checksum,
        })
    }

    /// Load a backup's archive, checking it against the checksum and
    /// contents recorded in the sidecar manifest.
    async fn load_verified(&self, backup_id: &str) -> Result<VerifiedBackup> {
        let manifest = self.backups.load_manifest(backup_id).await?;
        let data = self.backups.read_archive(backup_id).await?;

        let actual = archive::checksum(&data);
        if manifest.checksum.is_empty() {
            return Err(Error::Integrity(format!(
                "manifest for backup {} carries no checksum",
                backup_id
            )));
        }
        if actual != manifest.checksum {
            return Err(Error::Integrity(format!(
                "checksum mismatch for backup {}: expected {}, got {}",
                backup_id, manifest.checksum, actual
            )));
        }

        manifest.verify_structure()?;

        let contents = archive::read_archive(&data)?;
        if contents.manifest.backup_id != manifest.backup_id
            || contents.manifest.resource_count != manifest.resource_count
        {
            return Err(Error::Integrity(format!(
                "archive of backup {} was built for {} with {} resources, manifest says {} with {}",
                backup_id,
                contents.manifest.backup_id,
                contents.manifest.resource_count,
                manifest.backup_id,
                manifest.resource_count
            )));
        }
        if contents.resources != manifest.resources {
            return Err(Error::Integrity(format!(
                "manifest resources of backup {} differ from its archive",
                backup_id
            )));
        }

        Ok(VerifiedBackup {
            resources: contents.resources,
            archive_bytes: data.len(),
            checksum: actual,
        })
    }

    /// Execution history of a plan, oldest first
    pub async fn list_executions(&self, plan_id: &str) -> Result<Vec<RecoveryExecution>> {
        self.get_plan(plan_id).await?;
        self.store.list_executions(plan_id).await
    }
}

/// Keep resources whose kind is in `filters`, ignoring case and surrounding
/// whitespace. An empty filter list keeps everything.
pub fn filter_resources(
    resources: &[KubernetesResource],
    filters: &[String],
) -> Vec<KubernetesResource> {
    if filters.is_empty() {
        return resources.to_vec();
    }

    let allowed: HashSet<String> = filters
        .iter()
        .map(|f| f.trim().to_lowercase())
        .collect();

    resources
        .iter()
        .filter(|r| allowed.contains(&r.kind.to_lowercase()))
        .cloned()
        .collect()
}
