//! SQLite-backed store for the CLI's persistent state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use super::{JobStore, PlanStore};
use crate::models::{BackupJob, BackupRecord, RecoveryExecution, RecoveryPlan};
use crate::{Error, Result};

/// SQLite store (WAL journal). List fields are stored as JSON text.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        info!("Opened state database at {}", db_path.display());
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backup_jobs (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                namespace TEXT NOT NULL,
                resource_types TEXT NOT NULL,
                schedule TEXT NOT NULL,
                retention_days INTEGER NOT NULL,
                storage_location TEXT NOT NULL,
                status TEXT NOT NULL,
                last_run TEXT,
                next_run TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS backup_records (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                status TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                resource_count INTEGER NOT NULL,
                storage_path TEXT NOT NULL,
                error_message TEXT,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS recovery_plans (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                backup_id TEXT NOT NULL,
                target_namespace TEXT NOT NULL,
                resource_filters TEXT NOT NULL,
                strategy TEXT NOT NULL,
                conflict_policy TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recovery_executions (
                id TEXT PRIMARY KEY,
                plan_id TEXT NOT NULL,
                status TEXT NOT NULL,
                dry_run INTEGER NOT NULL,
                resources_restored INTEGER NOT NULL,
                resources_skipped INTEGER NOT NULL,
                errors TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_records_job ON backup_records(job_id);
            CREATE INDEX IF NOT EXISTS idx_executions_plan ON recovery_executions(plan_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Close the pool, checkpointing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| Error::State(format!("bad value in column {}: {}", column, e)))
}

fn json_column(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::State(format!("bad JSON in column {}: {}", column, e)))
}

fn duplicate_as_validation(err: sqlx::Error, what: &str, id: &str) -> Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return Error::Validation(format!("{} {} already exists", what, id));
        }
    }
    err.into()
}

fn job_from_row(row: &SqliteRow) -> Result<BackupJob> {
    Ok(BackupJob {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        namespace: row.try_get("namespace")?,
        resource_types: json_column(row, "resource_types")?,
        schedule: row.try_get("schedule")?,
        retention_days: row.try_get::<i64, _>("retention_days")?.max(0) as u32,
        storage_location: row.try_get("storage_location")?,
        status: parse_column(row, "status")?,
        last_run: row.try_get::<Option<DateTime<Utc>>, _>("last_run")?,
        next_run: row.try_get::<Option<DateTime<Utc>>, _>("next_run")?,
        created_at: row.try_get("created_at")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<BackupRecord> {
    Ok(BackupRecord {
        id: row.try_get("id")?,
        job_id: row.try_get("job_id")?,
        status: parse_column(row, "status")?,
        size_bytes: row.try_get::<i64, _>("size_bytes")?.max(0) as u64,
        duration_ms: row.try_get::<i64, _>("duration_ms")?.max(0) as u64,
        resource_count: row.try_get::<i64, _>("resource_count")?.max(0) as usize,
        storage_path: row.try_get("storage_path")?,
        error_message: row.try_get("error_message")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
    })
}

fn plan_from_row(row: &SqliteRow) -> Result<RecoveryPlan> {
    Ok(RecoveryPlan {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        backup_id: row.try_get("backup_id")?,
        target_namespace: row.try_get("target_namespace")?,
        resource_filters: json_column(row, "resource_filters")?,
        strategy: parse_column(row, "strategy")?,
        conflict_policy: parse_column(row, "conflict_policy")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn execution_from_row(row: &SqliteRow) -> Result<RecoveryExecution> {
    Ok(RecoveryExecution {
        id: row.try_get("id")?,
        plan_id: row.try_get("plan_id")?,
        status: parse_column(row, "status")?,
        dry_run: row.try_get::<i64, _>("dry_run")? != 0,
        resources_restored: row.try_get::<i64, _>("resources_restored")?.max(0) as usize,
        resources_skipped: row.try_get::<i64, _>("resources_skipped")?.max(0) as usize,
        errors: json_column(row, "errors")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
    })
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn insert_job(&self, job: &BackupJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backup_jobs
                (id, name, namespace, resource_types, schedule, retention_days,
                 storage_location, status, last_run, next_run, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.name)
        .bind(&job.namespace)
        .bind(serde_json::to_string(&job.resource_types)?)
        .bind(&job.schedule)
        .bind(job.retention_days as i64)
        .bind(&job.storage_location)
        .bind(job.status.as_str())
        .bind(job.last_run)
        .bind(job.next_run)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_as_validation(e, "job", &job.id))?;
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BackupJob>> {
        sqlx::query("SELECT * FROM backup_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(job_from_row)
            .transpose()
    }

    async fn list_jobs(&self) -> Result<Vec<BackupJob>> {
        sqlx::query("SELECT * FROM backup_jobs ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(job_from_row)
            .collect()
    }

    async fn update_job_runs(
        &self,
        job_id: &str,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE backup_jobs SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run)
            .bind(next_run)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn save_record(&self, record: &BackupRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backup_records
                (id, job_id, status, size_bytes, duration_ms, resource_count,
                 storage_path, error_message, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                size_bytes = excluded.size_bytes,
                duration_ms = excluded.duration_ms,
                resource_count = excluded.resource_count,
                storage_path = excluded.storage_path,
                error_message = excluded.error_message,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.job_id)
        .bind(record.status.as_str())
        .bind(record.size_bytes as i64)
        .bind(record.duration_ms as i64)
        .bind(record.resource_count as i64)
        .bind(&record.storage_path)
        .bind(&record.error_message)
        .bind(record.started_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_record(&self, record_id: &str) -> Result<Option<BackupRecord>> {
        sqlx::query("SELECT * FROM backup_records WHERE id = ?")
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(record_from_row)
            .transpose()
    }

    async fn list_records(&self, job_id: &str) -> Result<Vec<BackupRecord>> {
        sqlx::query("SELECT * FROM backup_records WHERE job_id = ? ORDER BY rowid")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(record_from_row)
            .collect()
    }

    async fn list_all_records(&self) -> Result<Vec<BackupRecord>> {
        sqlx::query("SELECT * FROM backup_records ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(record_from_row)
            .collect()
    }

    async fn delete_record(&self, record_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM backup_records WHERE id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PlanStore for SqliteStore {
    async fn insert_plan(&self, plan: &RecoveryPlan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recovery_plans
                (id, name, description, backup_id, target_namespace, resource_filters,
                 strategy, conflict_policy, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(&plan.backup_id)
        .bind(&plan.target_namespace)
        .bind(serde_json::to_string(&plan.resource_filters)?)
        .bind(plan.strategy.as_str())
        .bind(plan.conflict_policy.as_str())
        .bind(plan.status.as_str())
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_as_validation(e, "plan", &plan.id))?;
        Ok(())
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<RecoveryPlan>> {
        sqlx::query("SELECT * FROM recovery_plans WHERE id = ?")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(plan_from_row)
            .transpose()
    }

    async fn list_plans(&self) -> Result<Vec<RecoveryPlan>> {
        sqlx::query("SELECT * FROM recovery_plans ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(plan_from_row)
            .collect()
    }

    async fn save_execution(&self, execution: &RecoveryExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recovery_executions
                (id, plan_id, status, dry_run, resources_restored, resources_skipped,
                 errors, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                resources_restored = excluded.resources_restored,
                resources_skipped = excluded.resources_skipped,
                errors = excluded.errors,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&execution.id)
        .bind(&execution.plan_id)
        .bind(execution.status.as_str())
        .bind(execution.dry_run as i64)
        .bind(execution.resources_restored as i64)
        .bind(execution.resources_skipped as i64)
        .bind(serde_json::to_string(&execution.errors)?)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_executions(&self, plan_id: &str) -> Result<Vec<RecoveryExecution>> {
        sqlx::query("SELECT * FROM recovery_executions WHERE plan_id = ? ORDER BY rowid")
            .bind(plan_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(execution_from_row)
            .collect()
    }
}
