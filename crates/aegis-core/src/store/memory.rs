//! In-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{JobStore, PlanStore};
use crate::models::{BackupJob, BackupRecord, RecoveryExecution, RecoveryPlan};
use crate::{Error, Result};

#[derive(Default)]
struct JobTables {
    jobs: HashMap<String, BackupJob>,
    /// Creation order
    records: Vec<BackupRecord>,
}

#[derive(Default)]
struct PlanTables {
    plans: HashMap<String, RecoveryPlan>,
    executions: HashMap<String, Vec<RecoveryExecution>>,
}

/// Maps behind one reader-writer lock per collection group
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<JobTables>,
    plans: RwLock<PlanTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &BackupJob) -> Result<()> {
        let mut tables = self.jobs.write();
        if tables.jobs.contains_key(&job.id) {
            return Err(Error::Validation(format!("job {} already exists", job.id)));
        }
        tables.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BackupJob>> {
        Ok(self.jobs.read().jobs.get(job_id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<BackupJob>> {
        let mut jobs: Vec<BackupJob> = self.jobs.read().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn update_job_runs(
        &self,
        job_id: &str,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.jobs.write();
        match tables.jobs.get_mut(job_id) {
            Some(job) => {
                job.last_run = Some(last_run);
                job.next_run = Some(next_run);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_record(&self, record: &BackupRecord) -> Result<()> {
        let mut tables = self.jobs.write();
        match tables.records.iter().position(|r| r.id == record.id) {
            Some(idx) => tables.records[idx] = record.clone(),
            None => tables.records.push(record.clone()),
        }
        Ok(())
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<BackupRecord>> {
        Ok(self
            .jobs
            .read()
            .records
            .iter()
            .find(|r| r.id == record_id)
            .cloned())
    }

    async fn list_records(&self, job_id: &str) -> Result<Vec<BackupRecord>> {
        Ok(self
            .jobs
            .read()
            .records
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn list_all_records(&self) -> Result<Vec<BackupRecord>> {
        Ok(self.jobs.read().records.clone())
    }

    async fn delete_record(&self, record_id: &str) -> Result<bool> {
        let mut tables = self.jobs.write();
        let before = tables.records.len();
        tables.records.retain(|r| r.id != record_id);
        Ok(tables.records.len() != before)
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn insert_plan(&self, plan: &RecoveryPlan) -> Result<()> {
        let mut tables = self.plans.write();
        if tables.plans.contains_key(&plan.id) {
            return Err(Error::Validation(format!("plan {} already exists", plan.id)));
        }
        tables.plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<RecoveryPlan>> {
        Ok(self.plans.read().plans.get(plan_id).cloned())
    }

    async fn list_plans(&self) -> Result<Vec<RecoveryPlan>> {
        let mut plans: Vec<RecoveryPlan> = self.plans.read().plans.values().cloned().collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(plans)
    }

    async fn save_execution(&self, execution: &RecoveryExecution) -> Result<()> {
        let mut tables = self.plans.write();
        let history = tables
            .executions
            .entry(execution.plan_id.clone())
            .or_default();
        match history.iter().position(|e| e.id == execution.id) {
            Some(idx) => history[idx] = execution.clone(),
            None => history.push(execution.clone()),
        }
        Ok(())
    }

    async fn list_executions(&self, plan_id: &str) -> Result<Vec<RecoveryExecution>> {
        Ok(self
            .plans
            .read()
            .executions
            .get(plan_id)
            .cloned()
            .unwrap_or_default())
    }
}
