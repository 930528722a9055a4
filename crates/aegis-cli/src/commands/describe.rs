use anyhow::Result;
use aegis_core::{BackupManifest, BackupRecord};
use tracing::info;

use super::context::Context;
use super::output::{bytes, timestamp, OutputFormat};

pub async fn run(ctx: &Context, backup_id: &str, format: &str) -> Result<()> {
    info!("Loading backup manifest: {}", backup_id);

    let record = ctx.backups.get_backup_record(backup_id).await?;
    let manifest = ctx.backups.load_manifest(backup_id).await?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&manifest)?),
        OutputFormat::Text => print_manifest_text(&record, &manifest),
    }
    Ok(())
}

fn print_manifest_text(record: &BackupRecord, manifest: &BackupManifest) {
    let border = "=".repeat(72);

    println!("{}", border);
    println!("BACKUP {}", manifest.backup_id);
    println!("{}", border);
    println!("Job:            {}", manifest.job_id);
    println!("Namespace:      {}", manifest.namespace);
    println!("Resource types: {}", manifest.resource_types.join(", "));
    println!("Created:        {}", timestamp(Some(manifest.created_at)));
    println!("Status:         {}", record.status);
    println!("Archive:        {}", record.storage_path);
    println!("Size:           {}", bytes(record.size_bytes));
    println!("SHA-256:        {}", manifest.checksum);
    if let Some(message) = &record.error_message {
        println!("Errors:         {}", message);
    }

    println!("\nSummary ({} resources):", manifest.resource_count);
    for (kind, count) in manifest.kind_counts() {
        println!("  {:<32} {:>6}", kind, count);
    }

    if !manifest.resources.is_empty() {
        println!("\nResources:");
        for resource in &manifest.resources {
            println!(
                "  {}/{} ({}, {})",
                resource.kind,
                resource.name,
                resource.api_version,
                bytes(resource.manifest.len() as u64)
            );
        }
    }
}
