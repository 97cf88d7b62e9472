//! Alert events, sinks, and cooldown suppression.
//!
//! Both engines raise [`Alert`]s when a threshold is crossed. Delivery is
//! fire-and-forget: a sink failure is logged and never retried, and the
//! engines never block on it. Duplicate alerts for the same (directory,
//! reason) pair are suppressed for a severity-scaled cooldown window so a
//! persistently broken directory does not turn into an alert storm.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::sync::Mutex;

use crate::config;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reason codes for alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertReason {
    /// The submission URL is unreachable.
    DirectoryInaccessible,
    /// Response latency above the configured ceiling.
    SlowResponse,
    /// Rolling check success rate below the configured floor.
    LowSuccessRate,
    /// Selector-validity ratio below the configured floor.
    SelectorValidityDegraded,
    /// The page's form structure changed against the cached baseline.
    FormStructureChanged,
    /// Anti-automation risk level rose to medium or high.
    AntiAutomationRisk,
    /// A submission job exhausted its retry budget and failed.
    SubmissionFailed,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::DirectoryInaccessible => "directory inaccessible",
            AlertReason::SlowResponse => "slow response",
            AlertReason::LowSuccessRate => "low success rate",
            AlertReason::SelectorValidityDegraded => "selector validity degraded",
            AlertReason::FormStructureChanged => "form structure changed",
            AlertReason::AntiAutomationRisk => "anti-automation risk",
            AlertReason::SubmissionFailed => "submission failed",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single alert event.
///
/// Immutable and write-once: alerts carry no back-reference to the health
/// record that produced them.
#[derive(Debug, Clone)]
pub struct Alert {
    pub directory_id: String,
    pub severity: Severity,
    pub reason: AlertReason,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        directory_id: impl Into<String>,
        severity: Severity,
        reason: AlertReason,
        message: impl Into<String>,
    ) -> Self {
        Alert {
            directory_id: directory_id.into(),
            severity,
            reason,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for alert events.
///
/// Implementations render alerts as UI, email, or log lines; the engines
/// only know this trait.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers one alert. Failures are logged by the dispatcher, never
    /// retried.
    async fn deliver(&self, alert: &Alert) -> anyhow::Result<()>;
}

/// Default sink: writes alerts to the log at a level matching severity.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, alert: &Alert) -> anyhow::Result<()> {
        match alert.severity {
            Severity::Critical => error!(
                "ALERT [{}] {} ({}): {}",
                alert.severity, alert.directory_id, alert.reason, alert.message
            ),
            Severity::Warning => warn!(
                "ALERT [{}] {} ({}): {}",
                alert.severity, alert.directory_id, alert.reason, alert.message
            ),
            Severity::Info => info!(
                "ALERT [{}] {} ({}): {}",
                alert.severity, alert.directory_id, alert.reason, alert.message
            ),
        }
        Ok(())
    }
}

/// Dispatches alerts to a sink with per-(directory, reason) suppression.
///
/// Critical alerts have the shortest cooldown so a hard failure resurfaces
/// soonest; info alerts have the longest.
pub struct AlertDispatcher {
    sink: std::sync::Arc<dyn AlertSink>,
    last_sent: Mutex<HashMap<(String, AlertReason), Instant>>,
    cooldown_critical: Duration,
    cooldown_warning: Duration,
    cooldown_info: Duration,
}

impl AlertDispatcher {
    /// Creates a dispatcher with the default cooldowns.
    pub fn new(sink: std::sync::Arc<dyn AlertSink>) -> Self {
        Self::with_cooldowns(
            sink,
            config::ALERT_COOLDOWN_CRITICAL,
            config::ALERT_COOLDOWN_WARNING,
            config::ALERT_COOLDOWN_INFO,
        )
    }

    /// Creates a dispatcher with explicit cooldowns (tests use short ones).
    pub fn with_cooldowns(
        sink: std::sync::Arc<dyn AlertSink>,
        cooldown_critical: Duration,
        cooldown_warning: Duration,
        cooldown_info: Duration,
    ) -> Self {
        AlertDispatcher {
            sink,
            last_sent: Mutex::new(HashMap::new()),
            cooldown_critical,
            cooldown_warning,
            cooldown_info,
        }
    }

    fn cooldown_for(&self, severity: Severity) -> Duration {
        match severity {
            Severity::Critical => self.cooldown_critical,
            Severity::Warning => self.cooldown_warning,
            Severity::Info => self.cooldown_info,
        }
    }

    /// Dispatches one alert, applying cooldown suppression.
    ///
    /// Returns `true` if the alert was delivered, `false` if suppressed.
    /// Sink failures are logged and count as delivered: the alert left the
    /// engine, what the sink does with it is not our problem.
    pub async fn dispatch(&self, alert: Alert) -> bool {
        let key = (alert.directory_id.clone(), alert.reason);
        let cooldown = self.cooldown_for(alert.severity);
        {
            let mut last_sent = self.last_sent.lock().await;
            if let Some(sent_at) = last_sent.get(&key) {
                if sent_at.elapsed() < cooldown {
                    log::debug!(
                        "Suppressing alert for {} ({}): within {:?} cooldown",
                        alert.directory_id,
                        alert.reason,
                        cooldown
                    );
                    return false;
                }
            }
            last_sent.insert(key, Instant::now());
        }

        if let Err(e) = self.sink.deliver(&alert).await {
            warn!(
                "Alert sink failed for {} ({}): {}",
                alert.directory_id, alert.reason, e
            );
        }
        true
    }
}
