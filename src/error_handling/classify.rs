//! Error classification.
//!
//! Maps an arbitrary error chain onto an [`ErrorCategory`]. Classification is
//! a fixed precedence table: typed downcasts are consulted first, then
//! documented string signatures as a best-effort fallback for errors from
//! libraries that do not expose a typed surface. The string matching is
//! inherently fuzzy and is documented here as a heuristic, not a guarantee.

use std::sync::Arc;

use anyhow::Error;

use super::types::{ErrorCategory, SubmissionError};

/// A pluggable classifier function.
///
/// The queue engine takes one of these at construction so the precedence
/// table can be swapped out without touching the engine.
pub type ErrorClassifier = Arc<dyn Fn(&Error) -> ErrorCategory + Send + Sync>;

/// Returns the default classifier.
pub fn default_classifier() -> ErrorClassifier {
    Arc::new(classify_error)
}

/// Classifies an error chain into a category.
///
/// Precedence, first match wins:
/// 1. A `SubmissionError` anywhere in the chain: its own category.
/// 2. A `tokio::time::error::Elapsed`: timeout.
/// 3. A `reqwest::Error`: timeout/connect/request flags, then HTTP status
///    (429 and 403 read as anti-automation, 5xx as network).
/// 4. String signatures over the lowercased message, in the order: timeout,
///    anti-automation, missing form element, network.
/// 5. Anything else: unknown (most conservative: never retried).
pub fn classify_error(error: &Error) -> ErrorCategory {
    for cause in error.chain() {
        if let Some(submission_err) = cause.downcast_ref::<SubmissionError>() {
            return submission_err.category();
        }

        if cause.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return ErrorCategory::Timeout;
        }

        if let Some(reqwest_err) = cause.downcast_ref::<reqwest::Error>() {
            if reqwest_err.is_timeout() {
                return ErrorCategory::Timeout;
            }
            if let Some(status) = reqwest_err.status() {
                let code = status.as_u16();
                // 429 and 403 are the signature of automated-traffic defenses
                if code == 429 || code == 403 {
                    return ErrorCategory::AntiAutomation;
                }
                if (500..600).contains(&code) {
                    return ErrorCategory::Network;
                }
            }
            if reqwest_err.is_connect() || reqwest_err.is_request() {
                return ErrorCategory::Network;
            }
        }

        let msg = cause.to_string().to_lowercase();
        if msg.contains("timed out") || msg.contains("timeout") {
            return ErrorCategory::Timeout;
        }
        if msg.contains("captcha")
            || msg.contains("challenge")
            || msg.contains("cloudflare")
            || msg.contains("access denied")
            || msg.contains("bot detected")
        {
            return ErrorCategory::AntiAutomation;
        }
        if msg.contains("element not found")
            || msg.contains("no node")
            || msg.contains("no element")
            || msg.contains("could not find node")
            || msg.contains("selector")
        {
            return ErrorCategory::FormElementNotFound;
        }
        if msg.contains("connection")
            || msg.contains("network")
            || msg.contains("dns")
            || msg.contains("reset by peer")
            || msg.contains("broken pipe")
        {
            return ErrorCategory::Network;
        }
    }

    ErrorCategory::Unknown
}
