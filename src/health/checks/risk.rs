//! Anti-automation risk assessment.
//!
//! Inspects response headers and body for known defense signatures and
//! combines the signals present into a discrete risk level using a fixed
//! precedence rule: a hard challenge or managed-protection signature forces
//! `High` regardless of other signals; rate-limit headers alone yield
//! `Medium`; a soft signal yields `Low`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::health::record::RiskLevel;

/// Body signatures of an active challenge interstitial. Any match forces
/// `High`.
fn hard_challenge_body() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(checking your browser|just a moment\.\.\.|attention required!|cf-browser-verification|__cf_chl|ddos protection by|please verify you are a human|enable javascript and cookies to continue)",
        )
        .expect("hard challenge regex is a compile-time constant")
    })
}

/// Body signatures of passive bot tooling on the page. A match is a soft
/// signal.
fn soft_signal_body() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(recaptcha|hcaptcha|turnstile|bot.?detection|unusual traffic|automated requests)")
            .expect("soft signal regex is a compile-time constant")
    })
}

/// Header names that mark an active managed-protection response.
const MANAGED_PROTECTION_HEADERS: &[&str] = &["cf-mitigated", "x-sucuri-block", "x-ddos-protection"];

/// Header names that signal rate limiting.
const RATE_LIMIT_HEADERS: &[&str] = &["retry-after", "x-ratelimit-remaining", "ratelimit-remaining"];

/// Result of the risk assessment: the combined level plus the individual
/// signals that fired, for the alert message.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub signals: Vec<String>,
}

/// Assesses anti-automation risk from one response.
///
/// `headers` keys must be lowercased (the accessibility check produces them
/// that way).
pub fn assess_risk(
    headers: &HashMap<String, String>,
    body: Option<&str>,
    http_status: Option<u16>,
) -> RiskAssessment {
    let mut hard = Vec::new();
    let mut rate_limited = Vec::new();
    let mut soft = Vec::new();

    for name in MANAGED_PROTECTION_HEADERS {
        if headers.contains_key(*name) {
            hard.push(format!("managed-protection header: {name}"));
        }
    }

    if let Some(body) = body {
        if let Some(m) = hard_challenge_body().find(body) {
            hard.push(format!("challenge text: \"{}\"", m.as_str()));
        }
        if let Some(m) = soft_signal_body().find(body) {
            soft.push(format!("bot tooling: \"{}\"", m.as_str()));
        }
    }

    if http_status == Some(429) {
        rate_limited.push("HTTP 429".to_string());
    }
    for name in RATE_LIMIT_HEADERS {
        if let Some(value) = headers.get(*name) {
            // A remaining-count header only matters when exhausted.
            if name.contains("remaining") && value.trim() != "0" {
                continue;
            }
            rate_limited.push(format!("rate-limit header: {name}"));
        }
    }

    // Fixed precedence: hard > rate-limit > soft.
    let level = if !hard.is_empty() {
        RiskLevel::High
    } else if !rate_limited.is_empty() {
        RiskLevel::Medium
    } else if !soft.is_empty() {
        RiskLevel::Low
    } else {
        RiskLevel::None
    };

    let mut signals = hard;
    signals.extend(rate_limited);
    signals.extend(soft);

    RiskAssessment { level, signals }
}
