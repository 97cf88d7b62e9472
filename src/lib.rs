//! dirsubmit library: directory submission and health monitoring.
//!
//! This library automates submission of business-profile data into
//! third-party web directories and continuously monitors each directory's
//! health. Two engines share one architecture: a priority-ordered task
//! scheduler under a resource budget, with per-task retry/backoff policy,
//! state persistence, and alerting on threshold breach.
//!
//! # Example
//!
//! ```no_run
//! use dirsubmit::{run_submission, BusinessProfile, Config};
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     catalog_path: PathBuf::from("directories.json"),
//!     ..Default::default()
//! };
//! let profile = BusinessProfile {
//!     business_name: "Acme Plumbing".into(),
//!     ..Default::default()
//! };
//!
//! let report = run_submission(config, profile).await?;
//! println!(
//!     "{} jobs: {} succeeded, {} failed, {} skipped",
//!     report.total_jobs, report.succeeded, report.failed, report.skipped
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime and, for real submissions, a
//! Chromium-family browser on the host.

pub mod alerts;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod error_handling;
pub mod health;
pub mod initialization;
pub mod queue;
pub mod storage;
mod utils;

// Re-export public API
pub use alerts::{Alert, AlertReason, AlertSink, LogSink, Severity};
pub use catalog::{BusinessProfile, Catalog, DirectoryDescriptor, Tier};
pub use config::{Config, LogFormat, LogLevel};
pub use health::{HealthMonitor, HealthRecord, HealthStatus, MonitoringStatus, RiskLevel};
pub use queue::{JobStatus, QueueStatus, SubmissionQueue};
pub use run::{run_monitor, run_submission, SubmissionReport};

// Internal run module (orchestrates the engines for the CLI entry points)
mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::info;

    use crate::alerts::LogSink;
    use crate::browser::ChromiumSurface;
    use crate::catalog::{BusinessProfile, Catalog};
    use crate::config::Config;
    use crate::health::HealthMonitor;
    use crate::queue::SubmissionQueue;
    use crate::storage::{init_db_pool_with_path, run_migrations, QueueStore};

    /// Results of a completed submission run.
    #[derive(Debug, Clone)]
    pub struct SubmissionReport {
        /// Jobs enqueued for this run (including restored ones)
        pub total_jobs: usize,
        /// Jobs that completed successfully
        pub succeeded: usize,
        /// Jobs that exhausted their retry budget
        pub failed: usize,
        /// Jobs skipped by pre-flight or page probes
        pub skipped: usize,
        /// Retry attempts spent across all jobs
        pub retried: usize,
        /// Wall-clock duration of the run in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs the full submission pipeline for one business profile.
    ///
    /// Loads the catalog, starts the health monitor and the submission
    /// queue, restores any snapshotted work, enqueues the catalog, drains
    /// the queue, and shuts both engines down.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded, the database pool
    /// cannot be initialized, or the browser cannot be launched.
    pub async fn run_submission(
        config: Config,
        profile: BusinessProfile,
    ) -> Result<SubmissionReport> {
        let catalog =
            Catalog::load(&config.catalog_path).context("Failed to load directory catalog")?;

        let pool = init_db_pool_with_path(&config.db_path)
            .await
            .context("Failed to initialize database pool")?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        let store = QueueStore::new(pool);

        let sink = Arc::new(LogSink);
        let monitor = Arc::new(
            HealthMonitor::new(&config, &catalog, sink.clone())
                .context("Failed to initialize health monitor")?,
        );
        monitor.start().await;

        let surface = Arc::new(
            ChromiumSurface::launch()
                .await
                .context("Failed to launch browser surface")?,
        );

        let queue = SubmissionQueue::new(
            config,
            surface,
            sink,
            Some(monitor.view()),
            Some(store),
        );

        let restored = queue
            .restore_from_snapshot(&catalog)
            .await
            .context("Failed to restore queue snapshot")?;
        if restored > 0 {
            info!("Resuming interrupted run: {} jobs restored", restored);
        }
        let enqueued = queue.enqueue_catalog(&catalog, Arc::new(profile)).await;

        let start = std::time::Instant::now();
        queue.start().await;
        let status = queue.run_until_drained().await;
        queue.stop().await;
        monitor.stop();

        Ok(SubmissionReport {
            total_jobs: restored + enqueued.len(),
            succeeded: status.succeeded,
            failed: status.failed,
            skipped: status.skipped,
            retried: status.retried,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        })
    }

    /// Runs the health monitor on its own until `shutdown` resolves.
    ///
    /// Used by the `monitor` CLI command with ctrl-c as the shutdown signal.
    pub async fn run_monitor(
        config: Config,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<()> {
        let catalog =
            Catalog::load(&config.catalog_path).context("Failed to load directory catalog")?;
        let monitor = Arc::new(
            HealthMonitor::new(&config, &catalog, Arc::new(LogSink))
                .context("Failed to initialize health monitor")?,
        );
        monitor.start().await;

        shutdown.await;

        monitor.stop();
        let status = monitor.monitoring_status().await;
        info!(
            "Monitoring stopped: {} directories ({} healthy, {} degraded, {} unhealthy), {} checks, {} alerts",
            status.directories,
            status.healthy,
            status.degraded,
            status.unhealthy,
            status.checks_performed,
            status.alerts_raised
        );
        Ok(())
    }
}
