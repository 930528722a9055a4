use anyhow::Result;
use tracing::{error, info};

use super::context::Context;
use super::output::{bytes, emit, OutputFormat};

pub async fn run(ctx: &Context, backup_id: &str, format: &str) -> Result<()> {
    info!("Validating backup: {}", backup_id);

    let report = match ctx.recovery.validate_backup(backup_id).await {
        Ok(report) => report,
        Err(e) => {
            error!("Validation failed: {}", e);
            println!("Backup {}: INVALID", backup_id);
            println!("  {}", e);
            return Err(e.into());
        }
    };

    emit(&report, OutputFormat::from(format), |report| {
        println!("Backup {}: VALID", report.backup_id);
        println!("  Resources: {}", report.resource_count);
        println!("  Archive:   {}", bytes(report.archive_bytes as u64));
        println!("  SHA-256:   {}", report.checksum);
    })
}
