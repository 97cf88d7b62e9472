//! Per-directory health checks.
//!
//! Four independent sub-checks run as one logical task per directory:
//! accessibility, form-structure change detection, anti-automation risk
//! assessment, and selector validity. All four share one fetch.

mod accessibility;
mod risk;
mod selectors;
mod structure;

pub use accessibility::{check_accessibility, AccessibilityCheck};
pub use risk::{assess_risk, RiskAssessment};
pub use selectors::check_selectors;
pub use structure::{describe_changes, parse_form_structure};

use std::time::Duration;

use chrono::Utc;

use crate::alerts::{Alert, AlertReason, Severity};
use crate::catalog::DirectoryDescriptor;
use crate::config;
use crate::health::record::{HealthRecord, HealthStatus, RiskLevel};

/// Alert thresholds. Defaults come from `config::constants`; these are
/// tuning knobs, not invariants.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub success_rate_floor: f64,
    pub success_rate_critical: f64,
    pub latency_ceiling: Duration,
    pub latency_critical_multiplier: u32,
    pub validity_floor: f64,
    pub validity_critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            success_rate_floor: config::SUCCESS_RATE_FLOOR,
            success_rate_critical: config::SUCCESS_RATE_CRITICAL,
            latency_ceiling: config::LATENCY_CEILING,
            latency_critical_multiplier: config::LATENCY_CRITICAL_MULTIPLIER,
            validity_floor: config::SELECTOR_VALIDITY_FLOOR,
            validity_critical: config::SELECTOR_VALIDITY_CRITICAL,
        }
    }
}

/// Runs one full check cycle for a directory.
///
/// Takes the directory's prior record, returns the updated record plus the
/// alerts the cycle produced. Alert suppression is not applied here; the
/// monitor routes the alerts through its dispatcher.
pub async fn run_directory_check(
    client: &reqwest::Client,
    descriptor: &DirectoryDescriptor,
    prior: HealthRecord,
    thresholds: &Thresholds,
    fetch_timeout: Duration,
) -> (HealthRecord, Vec<Alert>) {
    let fetched =
        check_accessibility(client, &descriptor.submission_url, fetch_timeout).await;

    let mut record = prior;
    let mut alerts = Vec::new();

    record.status = fetched.status;
    record.last_latency = Some(fetched.latency);
    record.last_checked = Some(Utc::now());
    record.record_outcome(fetched.status == HealthStatus::Accessible);

    // Risk can be assessed from headers and status alone; the body refines it.
    let assessment = assess_risk(&fetched.headers, fetched.body.as_deref(), fetched.http_status);
    let prior_risk = record.risk_level;
    record.risk_level = assessment.level;

    let usable_body = (fetched.status == HealthStatus::Accessible)
        .then_some(fetched.body.as_deref())
        .flatten();
    if let Some(body) = usable_body {
        // Structure + selector validity need fresh markup from the real
        // page. Error bodies (5xx interstitials and the like) must not
        // re-baseline the structure or invalidate selectors.
        let structure = parse_form_structure(body, &descriptor.field_mapping, &descriptor.id);
        let new_hash = structure.fingerprint();

        if let (Some(old_structure), Some(old_hash)) = (&record.structure, record.structure_hash) {
            if old_hash != new_hash {
                let changes = describe_changes(old_structure, &structure);
                alerts.push(Alert::new(
                    &descriptor.id,
                    Severity::Warning,
                    AlertReason::FormStructureChanged,
                    format!("form structure changed: {}", changes.join("; ")),
                ));
            }
        }
        // Re-baseline immediately: a directory that changes and then
        // stabilizes produces exactly one change alert.
        record.structure = Some(structure);
        record.structure_hash = Some(new_hash);

        record.selector_validity =
            check_selectors(body, &descriptor.field_mapping, &descriptor.id);
    }

    alerts.extend(threshold_alerts(descriptor, &record, &fetched, thresholds));

    if record.risk_level > prior_risk && record.risk_level >= RiskLevel::Medium {
        let severity = if record.risk_level == RiskLevel::High {
            Severity::Critical
        } else {
            Severity::Warning
        };
        alerts.push(Alert::new(
            &descriptor.id,
            severity,
            AlertReason::AntiAutomationRisk,
            format!(
                "anti-automation risk rose to {} ({})",
                record.risk_level.as_str(),
                assessment.signals.join(", ")
            ),
        ));
    }

    (record, alerts)
}

/// Compares the updated record against the thresholds and produces alerts
/// with severity chosen by breach magnitude: near the threshold is a
/// warning, far past it (or total failure) is critical.
fn threshold_alerts(
    descriptor: &DirectoryDescriptor,
    record: &HealthRecord,
    fetched: &AccessibilityCheck,
    thresholds: &Thresholds,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if record.status == HealthStatus::Inaccessible {
        let detail = match fetched.http_status {
            Some(code) => format!("HTTP {code}"),
            None => "no response within timeout".to_string(),
        };
        alerts.push(Alert::new(
            &descriptor.id,
            Severity::Critical,
            AlertReason::DirectoryInaccessible,
            format!("submission URL unreachable: {detail}"),
        ));
    }

    if fetched.http_status.is_some() && fetched.latency > thresholds.latency_ceiling {
        let critical_ceiling =
            thresholds.latency_ceiling * thresholds.latency_critical_multiplier;
        let severity = if fetched.latency > critical_ceiling {
            Severity::Critical
        } else {
            Severity::Warning
        };
        alerts.push(Alert::new(
            &descriptor.id,
            severity,
            AlertReason::SlowResponse,
            format!(
                "response took {:.1}s (ceiling {:.1}s)",
                fetched.latency.as_secs_f64(),
                thresholds.latency_ceiling.as_secs_f64()
            ),
        ));
    }

    if let Some(rate) = record.success_rate() {
        if rate < thresholds.success_rate_floor {
            let severity = if rate < thresholds.success_rate_critical {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert::new(
                &descriptor.id,
                severity,
                AlertReason::LowSuccessRate,
                format!(
                    "rolling success rate {:.0}% below floor {:.0}%",
                    rate * 100.0,
                    thresholds.success_rate_floor * 100.0
                ),
            ));
        }
    }

    // Only alert on validity computed from fresh markup; a fetch that
    // returned no usable body left the map untouched.
    if fetched.status == HealthStatus::Accessible && fetched.body.is_some() {
        let ratio = record.validity_ratio();
        if ratio < thresholds.validity_floor {
            let severity = if ratio < thresholds.validity_critical {
                Severity::Critical
            } else {
                Severity::Warning
            };
            let broken: Vec<&str> = record
                .selector_validity
                .iter()
                .filter(|(_, valid)| !**valid)
                .map(|(field, _)| field.as_str())
                .collect();
            alerts.push(Alert::new(
                &descriptor.id,
                severity,
                AlertReason::SelectorValidityDegraded,
                format!(
                    "selector validity {:.0}% below floor {:.0}% (broken: {})",
                    ratio * 100.0,
                    thresholds.validity_floor * 100.0,
                    broken.join(", ")
                ),
            ));
        }
    }

    alerts
}
