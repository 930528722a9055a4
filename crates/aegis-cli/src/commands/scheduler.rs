//! Long-running scheduler: on every tick, run due jobs, then enforce
//! retention, until interrupted.

use anyhow::Result;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::context::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let interval_secs = ctx.config.scheduler.tick_interval_secs;
    info!(
        "Scheduler started (tick every {}s, retention {})",
        interval_secs,
        if ctx.config.scheduler.enforce_retention {
            "enabled"
        } else {
            "disabled"
        }
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(ctx).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping scheduler");
                ctx.recovery.shutdown();
                break;
            }
        }
    }

    Ok(())
}

async fn tick(ctx: &Context) {
    let due = match ctx.backups.schedule_backups().await {
        Ok(due) => due,
        Err(e) => {
            error!("Failed to load due jobs: {}", e);
            return;
        }
    };

    for job in &due {
        match ctx.backups.execute_backup(&job.id).await {
            Ok(outcome) if outcome.is_success() => {
                info!(job_id = %job.id, "Scheduled backup {} completed", outcome.record.id)
            }
            Ok(outcome) => warn!(
                job_id = %job.id,
                "Scheduled backup {} failed: {}",
                outcome.record.id,
                outcome.record.error_message.as_deref().unwrap_or("unknown error")
            ),
            Err(e) => error!(job_id = %job.id, "Scheduled backup could not run: {}", e),
        }
    }

    if !ctx.config.scheduler.enforce_retention {
        return;
    }

    let jobs = match ctx.backups.list_jobs().await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Failed to list jobs for retention: {}", e);
            return;
        }
    };
    for job in &jobs {
        if let Err(e) = ctx.backups.enforce_retention(&job.id).await {
            warn!(job_id = %job.id, "Retention enforcement failed: {}", e);
        }
    }
}
