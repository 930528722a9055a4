use anyhow::Result;
use tracing::{info, warn};

use super::context::Context;

/// Enforce retention for one job, or for every job when none is given
pub async fn enforce(ctx: &Context, job_id: Option<&str>) -> Result<()> {
    let job_ids = match job_id {
        Some(id) => vec![ctx.backups.get_job(id).await?.id],
        None => ctx
            .backups
            .list_jobs()
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect(),
    };

    let mut total = 0;
    for job_id in &job_ids {
        match ctx.backups.enforce_retention(job_id).await {
            Ok(deleted) => {
                if deleted > 0 {
                    println!("{}: deleted {} expired backups", job_id, deleted);
                }
                total += deleted;
            }
            Err(e) if job_ids.len() > 1 => warn!("Retention failed for {}: {}", job_id, e),
            Err(e) => return Err(e.into()),
        }
    }

    info!("Retention removed {} backups across {} jobs", total, job_ids.len());
    println!("Retention complete: {} expired backups deleted", total);
    Ok(())
}
