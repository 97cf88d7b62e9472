//! Accessibility sub-check.
//!
//! Issues one lightweight GET against the submission URL and classifies the
//! outcome. The fetched headers and body are handed to the other sub-checks
//! so a full directory check costs exactly one request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::health::record::HealthStatus;

/// Maximum body size retained for structure/risk analysis (2MB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Result of the accessibility fetch.
#[derive(Debug, Clone)]
pub struct AccessibilityCheck {
    pub status: HealthStatus,
    pub http_status: Option<u16>,
    pub latency: Duration,
    /// Lowercased header names → values.
    pub headers: HashMap<String, String>,
    /// Response body, when one was received. Truncated at `MAX_BODY_BYTES`.
    pub body: Option<String>,
}

/// Fetches the submission URL and classifies reachability.
///
/// A timeout or connection failure is `Inaccessible`, never an error: an
/// unreachable directory is a finding, not a fault in the monitor.
pub async fn check_accessibility(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> AccessibilityCheck {
    let started = Instant::now();
    let response = client.get(url).timeout(timeout).send().await;
    let latency = started.elapsed();

    match response {
        Ok(resp) => {
            let http_status = resp.status().as_u16();
            let status = classify_status(http_status);
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_lowercase(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();

            let body = match resp.text().await {
                Ok(mut text) => {
                    if text.len() > MAX_BODY_BYTES {
                        text.truncate(MAX_BODY_BYTES);
                    }
                    Some(text)
                }
                Err(e) => {
                    debug!("Failed to read body from {url}: {e}");
                    None
                }
            };

            AccessibilityCheck {
                status,
                http_status: Some(http_status),
                latency,
                headers,
                body,
            }
        }
        Err(e) => {
            debug!("Accessibility fetch for {url} failed: {e}");
            AccessibilityCheck {
                status: HealthStatus::Inaccessible,
                http_status: e.status().map(|s| s.as_u16()),
                latency,
                headers: HashMap::new(),
                body: None,
            }
        }
    }
}

/// HTTP status → reachability classification.
///
/// 4xx pages answer but are impaired (the submission flow may still be
/// salvageable with a fix); 5xx and transport failures are not worth
/// spending browser sessions on.
pub fn classify_status(status: u16) -> HealthStatus {
    match status {
        200..=399 => HealthStatus::Accessible,
        400..=499 => HealthStatus::Degraded,
        _ => HealthStatus::Inaccessible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), HealthStatus::Accessible);
        assert_eq!(classify_status(301), HealthStatus::Accessible);
        assert_eq!(classify_status(404), HealthStatus::Degraded);
        assert_eq!(classify_status(403), HealthStatus::Degraded);
        assert_eq!(classify_status(500), HealthStatus::Inaccessible);
        assert_eq!(classify_status(503), HealthStatus::Inaccessible);
    }
}
