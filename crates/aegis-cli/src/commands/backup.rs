use anyhow::{bail, Result};
use aegis_core::BackupRecord;
use tracing::{info, warn};

use super::context::Context;
use super::output::{bytes, emit, timestamp, OutputFormat};

pub async fn run(ctx: &Context, job_id: &str) -> Result<()> {
    info!("Running backup job: {}", job_id);

    let outcome = ctx.backups.execute_backup(job_id).await?;
    let record = &outcome.record;

    println!("Backup {} {}", record.id, record.status);
    println!("  Resources: {}", record.resource_count);
    println!("  Size:      {}", bytes(record.size_bytes));
    println!("  Duration:  {}ms", record.duration_ms);
    if let Some(message) = &record.error_message {
        warn!("{}", message);
        println!("  Errors:    {}", message);
    }

    if let Some(err) = outcome.error {
        bail!("Backup {} failed: {}", record.id, err);
    }
    Ok(())
}

pub async fn list(ctx: &Context, job_id: Option<&str>, format: &str) -> Result<()> {
    let records = match job_id {
        Some(job_id) => ctx.backups.list_backups(job_id).await?,
        None => ctx.backups.list_all_backups().await?,
    };
    emit(records.as_slice(), OutputFormat::from(format), print_records)
}

pub async fn delete(ctx: &Context, backup_id: &str) -> Result<()> {
    ctx.backups.delete_backup(backup_id).await?;
    println!("Deleted backup {}", backup_id);
    Ok(())
}

fn print_records(records: &[BackupRecord]) {
    if records.is_empty() {
        println!("No backups found");
        return;
    }

    println!(
        "{:<38} {:<38} {:<10} {:>9} {:>10} {:<24}",
        "ID", "JOB", "STATUS", "RESOURCES", "SIZE", "COMPLETED"
    );
    for record in records {
        println!(
            "{:<38} {:<38} {:<10} {:>9} {:>10} {:<24}",
            record.id,
            record.job_id,
            record.status,
            record.resource_count,
            bytes(record.size_bytes),
            timestamp(record.completed_at)
        );
    }
}
