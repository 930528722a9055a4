use anyhow::Result;
use aegis_core::{BackupJob, BackupJobSpec};
use tracing::info;

use super::context::Context;
use super::output::{emit, timestamp, OutputFormat};

pub async fn create(ctx: &Context, spec: BackupJobSpec) -> Result<()> {
    let job = ctx.backups.create_job(spec).await?;
    info!("Backup job created: {}", job.id);

    println!("Created backup job {}", job.id);
    println!("  Namespace:      {}", job.namespace);
    println!("  Resource types: {}", job.resource_types.join(", "));
    println!("  Schedule:       {}", job.schedule);
    println!("  Retention:      {} days", job.retention_days);
    println!("  Next run:       {}", timestamp(job.next_run));
    Ok(())
}

pub async fn list(ctx: &Context, format: &str) -> Result<()> {
    let jobs = ctx.backups.list_jobs().await?;
    emit(jobs.as_slice(), OutputFormat::from(format), print_jobs)
}

fn print_jobs(jobs: &[BackupJob]) {
    if jobs.is_empty() {
        println!("No backup jobs defined");
        return;
    }

    println!(
        "{:<38} {:<20} {:<16} {:<10} {:<14} {:<24}",
        "ID", "NAME", "NAMESPACE", "STATUS", "SCHEDULE", "NEXT RUN"
    );
    for job in jobs {
        println!(
            "{:<38} {:<20} {:<16} {:<10} {:<14} {:<24}",
            job.id,
            job.name,
            job.namespace,
            job.status,
            job.schedule,
            timestamp(job.next_run)
        );
    }
}
