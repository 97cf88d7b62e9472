//! Configuration constants.
//!
//! This module defines the tuned numeric defaults used throughout the
//! application: timeouts, retry budgets, health thresholds, and scheduling
//! intervals. Every value here is a default, overridable through `Config`.

use std::time::Duration;

// Queue engine defaults
/// Default number of concurrency slots for the submission queue.
/// One slot emulates human-paced, sequential browsing and keeps the risk of
/// triggering rate limits low. Raise only for automation surfaces that
/// support multiple independent sessions.
pub const DEFAULT_CONCURRENCY_SLOTS: usize = 1;
/// Base delay between two jobs in milliseconds. Jitter is added on top so
/// the request cadence never settles into a fixed, fingerprintable rhythm.
pub const INTER_JOB_BASE_DELAY_MS: u64 = 2_000;
/// Maximum jitter added to the base inter-job delay, in milliseconds.
pub const INTER_JOB_JITTER_MS: u64 = 3_000;
/// Per-job processing timeout. If an attempt runs past this, the watchdog
/// force-closes its browser session and fails the job.
/// Formula: page load (30s) + skip probe (5s) + field fill (60s) + buffer (25s) = 120s
pub const JOB_PROCESSING_TIMEOUT: Duration = Duration::from_secs(120);
/// Interval between watchdog sweeps over in-flight jobs.
pub const WATCHDOG_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Page load timeout for a submission page.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the field-filling operation on a loaded page.
pub const FIELD_FILL_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval between queue snapshots written to durable storage.
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);

// Retry strategy
/// Initial delay in milliseconds before the first retry.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which the retry delay is multiplied on each attempt.
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 30;
/// Maximum retries for network and timeout failures. These are transient:
/// patience usually helps.
pub const RETRY_MAX_NETWORK: u32 = 3;
/// Maximum retries for anti-automation and missing-form-element failures.
/// These usually require a structural fix, not patience, so the budget is
/// deliberately small.
pub const RETRY_MAX_STRUCTURAL: u32 = 1;

// Pre-flight
/// Selector-validity floor below which a queued job is skipped without
/// spending a browser session.
pub const PREFLIGHT_VALIDITY_FLOOR: f64 = 0.5;

// Health monitoring
/// Health-check fetch timeout.
pub const HEALTH_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Check interval for high-priority directories.
pub const CHECK_INTERVAL_HIGH: Duration = Duration::from_secs(15 * 60);
/// Check interval for medium-priority directories.
pub const CHECK_INTERVAL_MEDIUM: Duration = Duration::from_secs(60 * 60);
/// Check interval for low-priority directories.
pub const CHECK_INTERVAL_LOW: Duration = Duration::from_secs(4 * 60 * 60);
/// Maximum number of health checks running concurrently.
pub const HEALTH_MAX_CONCURRENT_CHECKS: usize = 4;
/// Stagger delay between dispatching two due checks.
pub const HEALTH_DISPATCH_STAGGER: Duration = Duration::from_millis(500);
/// Mean check duration above which the scheduler widens future intervals to
/// shed load.
pub const HEALTH_DURATION_BUDGET: Duration = Duration::from_secs(10);
/// Upper bound on the adaptive interval widening factor.
pub const HEALTH_MAX_LOAD_FACTOR: f64 = 4.0;
/// Size of the rolling success-rate window kept per directory.
pub const HEALTH_WINDOW_SIZE: usize = 20;
/// Capacity of the per-directory alert history ring buffer.
pub const ALERT_HISTORY_CAP: usize = 20;

// Alert thresholds
/// Rolling success-rate floor; checks below it raise an alert.
pub const SUCCESS_RATE_FLOOR: f64 = 0.7;
/// Success rate below this value escalates to critical.
pub const SUCCESS_RATE_CRITICAL: f64 = 0.4;
/// Response latency ceiling; slower responses raise an alert.
pub const LATENCY_CEILING: Duration = Duration::from_secs(10);
/// Latency beyond this multiple of the ceiling escalates to critical.
pub const LATENCY_CRITICAL_MULTIPLIER: u32 = 2;
/// Selector-validity floor; ratios below it raise an alert.
pub const SELECTOR_VALIDITY_FLOOR: f64 = 0.8;
/// Validity below this ratio escalates to critical.
pub const SELECTOR_VALIDITY_CRITICAL: f64 = 0.5;

// Alert suppression cooldowns, scaled by severity. Critical alerts have the
// shortest cooldown so a persistent hard failure resurfaces soonest.
/// Cooldown for repeated critical alerts on the same (directory, reason).
pub const ALERT_COOLDOWN_CRITICAL: Duration = Duration::from_secs(5 * 60);
/// Cooldown for repeated warning alerts on the same (directory, reason).
pub const ALERT_COOLDOWN_WARNING: Duration = Duration::from_secs(15 * 60);
/// Cooldown for repeated info alerts on the same (directory, reason).
pub const ALERT_COOLDOWN_INFO: Duration = Duration::from_secs(30 * 60);

/// Default database path for queue snapshots and the outcome log.
pub const DB_PATH: &str = "./dirsubmit.db";
