//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `dirsubmit` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use dirsubmit::catalog::Catalog;
use dirsubmit::config::{Config, LogFormat, LogLevel};
use dirsubmit::health::HealthMonitor;
use dirsubmit::initialization::init_logger_with;
use dirsubmit::storage::{init_db_pool_with_path, run_migrations, QueueStore};
use dirsubmit::{run_monitor, run_submission, BusinessProfile, LogSink};

#[derive(Parser)]
#[command(
    name = "dirsubmit",
    about = "Submits business profiles to web directories and monitors directory health"
)]
struct Cli {
    /// Path to the directory catalog (JSON)
    #[arg(long, default_value = "directories.json")]
    catalog: PathBuf,

    /// SQLite database path for queue snapshots and the outcome log
    #[arg(long, default_value = "./dirsubmit.db")]
    db_path: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain the submission queue for one business profile
    Run {
        /// Path to the business profile (JSON)
        #[arg(long)]
        profile: PathBuf,

        /// Concurrency slots (keep at 1 unless the surface supports more)
        #[arg(long, default_value_t = 1)]
        slots: usize,
    },
    /// Run the health monitoring loop until interrupted
    Monitor,
    /// Force one health check for a directory and print the result
    Check {
        /// Directory id from the catalog
        directory_id: String,
    },
    /// Print the job outcome summary from the database
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    let config = Config {
        catalog_path: cli.catalog.clone(),
        db_path: cli.db_path.clone(),
        log_level: cli.log_level,
        log_format: cli.log_format,
        ..Default::default()
    };

    let result = match cli.command {
        Command::Run { profile, slots } => run_command(config, profile, slots).await,
        Command::Monitor => {
            run_monitor(config, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
        }
        Command::Check { directory_id } => check_command(config, &directory_id).await,
        Command::Report => report_command(config).await,
    };

    if let Err(e) = result {
        eprintln!("dirsubmit error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

async fn run_command(mut config: Config, profile_path: PathBuf, slots: usize) -> Result<()> {
    config.concurrency_slots = slots;

    let raw = std::fs::read_to_string(&profile_path)
        .with_context(|| format!("Failed to read profile {}", profile_path.display()))?;
    let profile: BusinessProfile =
        serde_json::from_str(&raw).context("Failed to parse business profile")?;

    let db_path = config.db_path.clone();
    let report = run_submission(config, profile).await?;

    println!(
        "Processed {} job{} ({} succeeded, {} failed, {} skipped, {} retries) in {:.1}s",
        report.total_jobs,
        if report.total_jobs == 1 { "" } else { "s" },
        report.succeeded,
        report.failed,
        report.skipped,
        report.retried,
        report.elapsed_seconds
    );
    println!("Outcomes saved in {}", db_path.display());
    Ok(())
}

async fn check_command(config: Config, directory_id: &str) -> Result<()> {
    let catalog = Catalog::load(&config.catalog_path).context("Failed to load catalog")?;
    let monitor = HealthMonitor::new(&config, &catalog, Arc::new(LogSink))
        .context("Failed to initialize health monitor")?;

    let record = monitor.force_check(directory_id).await?;
    println!("directory:   {}", record.directory_id);
    println!("status:      {}", record.status.as_str());
    if let Some(latency) = record.last_latency {
        println!("latency:     {:.0}ms", latency.as_secs_f64() * 1000.0);
    }
    println!("risk:        {}", record.risk_level.as_str());
    println!("validity:    {:.0}%", record.validity_ratio() * 100.0);
    for (field, valid) in &record.selector_validity {
        println!("  {} {}", if *valid { "ok " } else { "BAD" }, field);
    }
    Ok(())
}

async fn report_command(config: Config) -> Result<()> {
    let pool = init_db_pool_with_path(&config.db_path)
        .await
        .context("Failed to open database")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;
    let store = QueueStore::new(pool);

    let summary = store.outcome_summary().await?;
    if summary.is_empty() {
        println!("No job outcomes recorded yet.");
        return Ok(());
    }
    println!("Job outcomes:");
    for row in summary {
        println!("  {:<10} {}", row.status, row.count);
    }
    Ok(())
}
