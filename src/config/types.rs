//! Configuration types.
//!
//! This module defines the library configuration struct and the enums shared
//! with command-line argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// This is the core configuration struct used by both engines. It can be
/// constructed programmatically without any CLI dependencies; all numeric
/// defaults come from [`crate::config::constants`] and are tuning knobs, not
/// invariants.
///
/// # Examples
///
/// ```no_run
/// use dirsubmit::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     catalog_path: PathBuf::from("directories.json"),
///     concurrency_slots: 1,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the directory catalog (JSON)
    pub catalog_path: PathBuf,

    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Database path (SQLite file) for queue snapshots and the outcome log
    pub db_path: PathBuf,

    /// Number of concurrency slots for the submission queue
    pub concurrency_slots: usize,

    /// Base delay between jobs, before jitter
    pub inter_job_base_delay: Duration,

    /// Maximum jitter added to the inter-job delay
    pub inter_job_jitter: Duration,

    /// Per-job processing timeout enforced by the watchdog
    pub job_processing_timeout: Duration,

    /// Watchdog sweep interval
    pub watchdog_interval: Duration,

    /// Page load timeout
    pub page_load_timeout: Duration,

    /// Field-fill timeout
    pub field_fill_timeout: Duration,

    /// Retry budget for network/timeout failures
    pub max_network_retries: u32,

    /// Retry budget for anti-automation/missing-element failures
    pub max_structural_retries: u32,

    /// Selector-validity floor for the pre-flight check
    pub preflight_validity_floor: f64,

    /// Interval between durable queue snapshots
    pub snapshot_interval: Duration,

    /// Health-check fetch timeout
    pub health_fetch_timeout: Duration,

    /// Maximum concurrent health checks
    pub max_concurrent_checks: usize,

    /// HTTP User-Agent header for health-check fetches
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("directories.json"),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            db_path: PathBuf::from(constants::DB_PATH),
            concurrency_slots: constants::DEFAULT_CONCURRENCY_SLOTS,
            inter_job_base_delay: Duration::from_millis(constants::INTER_JOB_BASE_DELAY_MS),
            inter_job_jitter: Duration::from_millis(constants::INTER_JOB_JITTER_MS),
            job_processing_timeout: constants::JOB_PROCESSING_TIMEOUT,
            watchdog_interval: constants::WATCHDOG_SWEEP_INTERVAL,
            page_load_timeout: constants::PAGE_LOAD_TIMEOUT,
            field_fill_timeout: constants::FIELD_FILL_TIMEOUT,
            max_network_retries: constants::RETRY_MAX_NETWORK,
            max_structural_retries: constants::RETRY_MAX_STRUCTURAL,
            preflight_validity_floor: constants::PREFLIGHT_VALIDITY_FLOOR,
            snapshot_interval: constants::SNAPSHOT_INTERVAL,
            health_fetch_timeout: constants::HEALTH_FETCH_TIMEOUT,
            max_concurrent_checks: constants::HEALTH_MAX_CONCURRENT_CHECKS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Default User-Agent string for health-check fetches.
///
/// A current desktop Chrome string keeps the lightweight health probes from
/// standing out in server logs. Users can override it via `Config`.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.concurrency_slots, 1);
        assert_eq!(config.max_network_retries, 3);
        assert_eq!(config.max_structural_retries, 1);
        assert!(config.preflight_validity_floor > 0.0);
        assert_eq!(config.db_path, PathBuf::from("./dirsubmit.db"));
    }

    #[test]
    fn test_default_jitter_is_bounded() {
        let config = Config::default();
        // The jitter bound must be finite and nonzero, otherwise the inter-job
        // cadence degenerates into a fixed rhythm.
        assert!(config.inter_job_jitter > Duration::ZERO);
        assert!(config.inter_job_jitter < Duration::from_secs(60));
    }
}
