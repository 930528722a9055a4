//! Recovery plan execution, dry runs and history.
//!
//! A Ctrl-C during an execution cancels it after the resource in flight;
//! the execution is still recorded as failed.

use anyhow::{bail, Result};
use aegis_core::{Error, RecoveryExecution, RecoveryOutcome};
use tracing::{info, warn};

use super::context::Context;
use super::output::{emit, timestamp, OutputFormat};

pub async fn run(ctx: &Context, plan_id: &str) -> Result<()> {
    info!("Executing recovery plan: {}", plan_id);
    let outcome = with_interrupt(ctx, ctx.recovery.execute_recovery(plan_id)).await?;
    report(outcome)
}

pub async fn dry_run(ctx: &Context, plan_id: &str) -> Result<()> {
    info!("Dry-running recovery plan: {}", plan_id);
    println!("DRY RUN: no resources will be applied\n");
    let outcome = with_interrupt(ctx, ctx.recovery.dry_run(plan_id)).await?;
    report(outcome)
}

pub async fn history(ctx: &Context, plan_id: &str, format: &str) -> Result<()> {
    let executions = ctx.recovery.list_executions(plan_id).await?;
    emit(
        executions.as_slice(),
        OutputFormat::from(format),
        print_history,
    )
}

/// Drive `execution`, cancelling the recovery manager on Ctrl-C
async fn with_interrupt<F>(ctx: &Context, execution: F) -> aegis_core::Result<RecoveryOutcome>
where
    F: std::future::Future<Output = aegis_core::Result<RecoveryOutcome>>,
{
    tokio::pin!(execution);
    tokio::select! {
        outcome = &mut execution => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received, cancelling recovery");
            ctx.recovery.shutdown();
            execution.await
        }
    }
}

fn report(outcome: RecoveryOutcome) -> Result<()> {
    print_execution(&outcome.execution);

    match outcome.error {
        None => Ok(()),
        Some(Error::Cancelled) => bail!("Recovery {} was cancelled", outcome.execution.id),
        Some(err) => bail!("Recovery {} failed: {}", outcome.execution.id, err),
    }
}

fn print_execution(execution: &RecoveryExecution) {
    println!("Recovery {} {}", execution.id, execution.status);
    println!("  Restored: {}", execution.resources_restored);
    println!("  Skipped:  {}", execution.resources_skipped);
    if !execution.errors.is_empty() {
        println!("  Errors:");
        for error in &execution.errors {
            println!("    - {}", error);
        }
    }
}

fn print_history(executions: &[RecoveryExecution]) {
    if executions.is_empty() {
        println!("No executions recorded for this plan");
        return;
    }

    println!(
        "{:<38} {:<10} {:<8} {:>8} {:>8} {:>7} {:<24}",
        "ID", "STATUS", "DRY RUN", "RESTORED", "SKIPPED", "ERRORS", "STARTED"
    );
    for execution in executions {
        println!(
            "{:<38} {:<10} {:<8} {:>8} {:>8} {:>7} {:<24}",
            execution.id,
            execution.status,
            execution.dry_run,
            execution.resources_restored,
            execution.resources_skipped,
            execution.errors.len(),
            timestamp(Some(execution.started_at))
        );
    }
}
