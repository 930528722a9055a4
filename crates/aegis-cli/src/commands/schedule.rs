use anyhow::Result;
use tracing::{error, info};

use super::context::Context;
use super::output::timestamp;

/// Show the jobs due now, optionally running them
pub async fn due(ctx: &Context, run: bool) -> Result<()> {
    let jobs = ctx.backups.schedule_backups().await?;
    if jobs.is_empty() {
        println!("No backup jobs are due");
        return Ok(());
    }

    println!("{} backup jobs due:", jobs.len());
    for job in &jobs {
        println!("  - {} ({}), due {}", job.id, job.name, timestamp(job.next_run));
    }

    if !run {
        return Ok(());
    }

    for job in &jobs {
        info!("Running due job {}", job.id);
        match ctx.backups.execute_backup(&job.id).await {
            Ok(outcome) => println!(
                "  {} -> {} ({})",
                job.id, outcome.record.id, outcome.record.status
            ),
            Err(e) => error!("Job {} could not run: {}", job.id, e),
        }
    }
    Ok(())
}
