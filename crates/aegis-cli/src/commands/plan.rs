use anyhow::Result;
use aegis_core::{RecoveryPlan, RecoveryPlanSpec};
use tracing::info;

use super::context::Context;
use super::output::{emit, timestamp, OutputFormat};

pub async fn create(ctx: &Context, spec: RecoveryPlanSpec) -> Result<()> {
    let plan = ctx.recovery.create_plan(spec).await?;
    info!("Recovery plan created: {}", plan.id);

    println!("Created recovery plan {}", plan.id);
    println!("  Backup:           {}", plan.backup_id);
    println!("  Target namespace: {}", plan.target_namespace);
    println!("  Strategy:         {}", plan.strategy);
    println!("  Conflict policy:  {}", plan.conflict_policy);
    if !plan.resource_filters.is_empty() {
        println!("  Filters:          {}", plan.resource_filters.join(", "));
    }
    Ok(())
}

pub async fn list(ctx: &Context, format: &str) -> Result<()> {
    let plans = ctx.recovery.list_plans().await?;
    emit(plans.as_slice(), OutputFormat::from(format), print_plans)
}

fn print_plans(plans: &[RecoveryPlan]) {
    if plans.is_empty() {
        println!("No recovery plans defined");
        return;
    }

    println!(
        "{:<38} {:<20} {:<38} {:<16} {:<10} {:<24}",
        "ID", "NAME", "BACKUP", "TARGET", "POLICY", "CREATED"
    );
    for plan in plans {
        println!(
            "{:<38} {:<20} {:<38} {:<16} {:<10} {:<24}",
            plan.id,
            plan.name,
            plan.backup_id,
            plan.target_namespace,
            plan.conflict_policy,
            timestamp(Some(plan.created_at))
        );
    }
}
