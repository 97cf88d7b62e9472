//! Directory health monitoring engine.
//!
//! Continuously re-validates every catalog directory: is the submission page
//! reachable, does its form structure still match what the queue engine
//! expects, have new anti-automation defenses appeared. Raises alerts before
//! the queue engine wastes browser sessions on a directory that has silently
//! changed.
//!
//! The monitor is the sole writer of the health-record table; the queue
//! engine reads it through a [`HealthView`] for its pre-flight check.

pub mod checks;
mod record;
mod scheduler;

pub use checks::Thresholds;
pub use record::{FormStructure, HealthRecord, HealthStatus, HealthTable, HealthView, RiskLevel};
pub use scheduler::{interval_for, CheckScheduler, CheckTask};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use log::{debug, info};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::alerts::{AlertDispatcher, AlertSink};
use crate::catalog::{Catalog, DirectoryDescriptor};
use crate::config::{self, Config};
use crate::error_handling::InitializationError;

/// Aggregate monitoring counters.
#[derive(Debug, Clone)]
pub struct MonitoringStatus {
    pub directories: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unchecked: usize,
    pub checks_performed: usize,
    pub alerts_raised: usize,
    /// Current adaptive interval widening factor (1.0 = nominal).
    pub load_factor: f64,
}

/// The health monitoring engine.
pub struct HealthMonitor {
    client: reqwest::Client,
    table: HealthTable,
    dispatcher: AlertDispatcher,
    scheduler: CheckScheduler,
    thresholds: Thresholds,
    fetch_timeout: Duration,
    max_concurrent: usize,
    descriptors: RwLock<HashMap<String, Arc<DirectoryDescriptor>>>,
    checks_performed: AtomicUsize,
    alerts_raised: AtomicUsize,
    cancel: CancellationToken,
}

impl HealthMonitor {
    /// Creates a monitor over the given catalog, emitting alerts to `sink`.
    pub fn new(
        config: &Config,
        catalog: &Catalog,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self, InitializationError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.health_fetch_timeout)
            .build()?;

        let descriptors = catalog
            .entries()
            .iter()
            .map(|d| (d.id.clone(), Arc::clone(d)))
            .collect();

        Ok(HealthMonitor {
            client,
            table: HealthTable::new(catalog.entries()),
            dispatcher: AlertDispatcher::new(sink),
            scheduler: CheckScheduler::new(),
            thresholds: Thresholds::default(),
            fetch_timeout: config.health_fetch_timeout,
            max_concurrent: config.max_concurrent_checks,
            descriptors: RwLock::new(descriptors),
            checks_performed: AtomicUsize::new(0),
            alerts_raised: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
        })
    }

    /// Overrides the alert thresholds (tests use tight ones).
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Returns a read-only view of the health-record table for consumers.
    pub fn view(&self) -> HealthView {
        self.table.view()
    }

    /// Runs one full check cycle for a directory and publishes the result.
    ///
    /// Updates the record table, dispatches alerts (with suppression), and
    /// returns the updated record.
    pub async fn check_directory(&self, descriptor: &DirectoryDescriptor) -> HealthRecord {
        let prior = self
            .table
            .get(&descriptor.id)
            .await
            .unwrap_or_else(|| HealthRecord::new(descriptor));

        let started = Instant::now();
        let (mut record, alerts) = checks::run_directory_check(
            &self.client,
            descriptor,
            prior,
            &self.thresholds,
            self.fetch_timeout,
        )
        .await;
        self.scheduler.record_duration(started.elapsed()).await;
        self.checks_performed.fetch_add(1, Ordering::SeqCst);

        for alert in alerts {
            if self.dispatcher.dispatch(alert.clone()).await {
                self.alerts_raised.fetch_add(1, Ordering::SeqCst);
                record.push_alert(alert);
            }
        }

        self.table.replace(record.clone()).await;
        debug!(
            "Checked {}: status={}, risk={}, validity={:.0}%",
            descriptor.id,
            record.status.as_str(),
            record.risk_level.as_str(),
            record.validity_ratio() * 100.0
        );
        record
    }

    /// Operator-facing forced check by directory id.
    pub async fn force_check(&self, directory_id: &str) -> Result<HealthRecord> {
        let descriptor = self
            .descriptors
            .read()
            .await
            .get(directory_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown directory id: {directory_id}"))?;
        Ok(self.check_directory(&descriptor).await)
    }

    /// Latest health record for a directory, if one exists.
    pub async fn health_summary(&self, directory_id: &str) -> Option<HealthRecord> {
        self.table.get(directory_id).await
    }

    /// Aggregate healthy/unhealthy counts plus engine counters.
    pub async fn monitoring_status(&self) -> MonitoringStatus {
        let records = self.table.all().await;
        let mut status = MonitoringStatus {
            directories: records.len(),
            healthy: 0,
            degraded: 0,
            unhealthy: 0,
            unchecked: 0,
            checks_performed: self.checks_performed.load(Ordering::SeqCst),
            alerts_raised: self.alerts_raised.load(Ordering::SeqCst),
            load_factor: self.scheduler.load_factor().await,
        };
        for record in &records {
            match record.status {
                HealthStatus::Accessible => status.healthy += 1,
                HealthStatus::Degraded => status.degraded += 1,
                HealthStatus::Inaccessible => status.unhealthy += 1,
                HealthStatus::Unknown => status.unchecked += 1,
            }
        }
        status
    }

    /// Starts the monitoring loop on a background task.
    pub async fn start(self: &Arc<Self>) {
        let entries: Vec<Arc<DirectoryDescriptor>> =
            self.descriptors.read().await.values().cloned().collect();
        self.scheduler.seed(&entries).await;
        info!(
            "Health monitor started: {} directories, {} max concurrent checks",
            entries.len(),
            self.max_concurrent
        );

        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            monitor.run_loop().await;
        });
    }

    /// Stops task scheduling. In-flight checks are allowed to complete since
    /// they hold no exclusive resource.
    pub fn stop(&self) {
        self.cancel.cancel();
        info!("Health monitor stopping");
    }

    /// Resets records and scheduling from a freshly reloaded catalog.
    pub async fn reload_catalog(&self, catalog: &Catalog) {
        let mut descriptors = self.descriptors.write().await;
        descriptors.clear();
        for d in catalog.entries() {
            descriptors.insert(d.id.clone(), Arc::clone(d));
        }
        drop(descriptors);

        self.table.reset(catalog.entries()).await;
        self.scheduler.seed(catalog.entries()).await;
        info!(
            "Health monitor reset from catalog version {} ({} directories)",
            catalog.version(),
            catalog.entries().len()
        );
    }

    async fn run_loop(self: Arc<Self>) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.scheduler.pop_due().await {
                Some(task) => {
                    let descriptor = self.descriptors.read().await.get(&task.directory_id).cloned();
                    // A task may outlive its directory across a catalog
                    // reload; drop it silently.
                    let Some(descriptor) = descriptor else {
                        continue;
                    };

                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let monitor = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        monitor.check_directory(&descriptor).await;
                        monitor
                            .scheduler
                            .reschedule(&descriptor.id, descriptor.tier)
                            .await;
                    });

                    // Stagger dispatch so a burst of due tasks does not land
                    // on the network at once.
                    tokio::select! {
                        _ = tokio::time::sleep(config::HEALTH_DISPATCH_STAGGER) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
                None => {
                    let sleep_for = match self.scheduler.next_wakeup().await {
                        Some(at) => at
                            .saturating_duration_since(Instant::now())
                            .min(Duration::from_secs(1)),
                        None => Duration::from_secs(1),
                    };
                    tokio::select! {
                        _ = tokio::time::sleep(sleep_for) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
            }
        }
        debug!("Health monitor loop exited");
    }
}
