use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aegis_core::{BackupJobSpec, ConflictPolicy, JobStatus, RecoveryPlanSpec, RecoveryStrategy};

mod commands;

use commands::context::{Context, GlobalOptions};

#[derive(Parser)]
#[command(name = "aegis")]
#[command(about = "Backup and disaster recovery for cluster resources", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file (YAML)
    #[arg(short, long, global = true, env = "AEGIS_CONFIG")]
    config: Option<PathBuf>,

    /// Use an in-memory simulated cluster instead of a live one
    #[arg(long, global = true)]
    simulate: bool,

    /// JSON list of resources to seed the simulated cluster with (with --simulate)
    #[arg(long, global = true)]
    seed: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage backup jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Run, list and delete backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Delete backups older than their job's retention window
    Retention {
        #[command(subcommand)]
        action: RetentionAction,
    },

    /// Inspect which jobs are due
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Manage recovery plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Execute or dry-run recovery plans
    Recover {
        #[command(subcommand)]
        action: RecoverAction,
    },

    /// Verify a backup's archive against its manifest
    Validate {
        /// Backup ID to validate
        backup_id: String,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show detailed backup manifest information
    Describe {
        /// Backup ID to describe
        backup_id: String,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run due jobs and enforce retention on a fixed tick until interrupted
    Scheduler,
}

#[derive(Subcommand)]
enum JobAction {
    /// Create a backup job
    Create {
        /// Job name
        #[arg(short, long)]
        name: String,

        /// Namespace to back up
        #[arg(short = 'N', long)]
        namespace: String,

        /// Resource types to capture (comma-separated)
        #[arg(short = 't', long = "resource-types", value_delimiter = ',', required = true)]
        resource_types: Vec<String>,

        /// Schedule (@hourly, @daily, @weekly or */N * * * *)
        #[arg(short, long, default_value = "@daily")]
        schedule: String,

        /// Retention in days (defaults to the configured retention)
        #[arg(long)]
        retention_days: Option<u32>,

        /// Storage location recorded on the job
        #[arg(long)]
        storage_location: Option<String>,

        /// Explicit job ID
        #[arg(long)]
        id: Option<String>,

        /// Create the job paused
        #[arg(long)]
        paused: bool,
    },

    /// List backup jobs
    List {
        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Execute a backup job now
    Run {
        /// Job ID to run
        job_id: String,
    },

    /// List backups, for one job or all jobs
    List {
        /// Only show backups of this job
        #[arg(short, long)]
        job_id: Option<String>,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a backup and its stored data
    Delete {
        /// Backup ID to delete
        backup_id: String,
    },
}

#[derive(Subcommand)]
enum RetentionAction {
    /// Enforce retention for one job, or every job
    Enforce {
        /// Job ID (all jobs if omitted)
        #[arg(short, long)]
        job_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// List active jobs whose next run has passed
    Due {
        /// Run the due jobs as well
        #[arg(long)]
        run: bool,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// Create a recovery plan for a completed backup
    Create {
        /// Plan name
        #[arg(short, long)]
        name: String,

        /// Backup ID to restore from
        #[arg(short, long)]
        backup_id: String,

        /// Namespace to restore into
        #[arg(short, long)]
        target_namespace: String,

        /// Resource kinds to restore (comma-separated, all if omitted)
        #[arg(long, value_delimiter = ',')]
        filters: Vec<String>,

        /// Recovery strategy (in-place, new-namespace, cross-cluster)
        #[arg(long, default_value = "in-place")]
        strategy: RecoveryStrategy,

        /// What to do with resources that already exist (skip, overwrite)
        #[arg(long, default_value = "skip")]
        conflict_policy: ConflictPolicy,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// List recovery plans
    List {
        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum RecoverAction {
    /// Execute a recovery plan
    Run {
        /// Plan ID to execute
        plan_id: String,
    },

    /// Simulate a recovery plan without applying anything
    DryRun {
        /// Plan ID to simulate
        plan_id: String,
    },

    /// Show a plan's execution history
    History {
        /// Plan ID
        plan_id: String,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let options = GlobalOptions {
        config: cli.config,
        simulate: cli.simulate,
        seed: cli.seed,
    };
    let ctx = Context::build(&options).await?;

    let result = dispatch(&ctx, cli.command).await;
    ctx.close().await;
    result
}

async fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Job { action } => match action {
            JobAction::Create {
                name,
                namespace,
                resource_types,
                schedule,
                retention_days,
                storage_location,
                id,
                paused,
            } => {
                let spec = BackupJobSpec {
                    id,
                    name,
                    namespace,
                    resource_types,
                    schedule,
                    retention_days,
                    storage_location,
                    status: paused.then_some(JobStatus::Paused),
                };
                commands::job::create(ctx, spec).await?;
            }
            JobAction::List { format } => {
                commands::job::list(ctx, &format).await?;
            }
        },
        Commands::Backup { action } => match action {
            BackupAction::Run { job_id } => {
                commands::backup::run(ctx, &job_id).await?;
            }
            BackupAction::List { job_id, format } => {
                commands::backup::list(ctx, job_id.as_deref(), &format).await?;
            }
            BackupAction::Delete { backup_id } => {
                commands::backup::delete(ctx, &backup_id).await?;
            }
        },
        Commands::Retention { action } => match action {
            RetentionAction::Enforce { job_id } => {
                commands::retention::enforce(ctx, job_id.as_deref()).await?;
            }
        },
        Commands::Schedule { action } => match action {
            ScheduleAction::Due { run } => {
                commands::schedule::due(ctx, run).await?;
            }
        },
        Commands::Plan { action } => match action {
            PlanAction::Create {
                name,
                backup_id,
                target_namespace,
                filters,
                strategy,
                conflict_policy,
                description,
            } => {
                let spec = RecoveryPlanSpec {
                    id: None,
                    name,
                    description,
                    backup_id,
                    target_namespace,
                    resource_filters: filters,
                    strategy: Some(strategy),
                    conflict_policy: Some(conflict_policy),
                };
                commands::plan::create(ctx, spec).await?;
            }
            PlanAction::List { format } => {
                commands::plan::list(ctx, &format).await?;
            }
        },
        Commands::Recover { action } => match action {
            RecoverAction::Run { plan_id } => {
                commands::recover::run(ctx, &plan_id).await?;
            }
            RecoverAction::DryRun { plan_id } => {
                commands::recover::dry_run(ctx, &plan_id).await?;
            }
            RecoverAction::History { plan_id, format } => {
                commands::recover::history(ctx, &plan_id, &format).await?;
            }
        },
        Commands::Validate { backup_id, format } => {
            commands::validate::run(ctx, &backup_id, &format).await?;
        }
        Commands::Describe { backup_id, format } => {
            commands::describe::run(ctx, &backup_id, &format).await?;
        }
        Commands::Scheduler => {
            commands::scheduler::run(ctx).await?;
        }
    }

    Ok(())
}
