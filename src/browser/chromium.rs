//! Headless Chromium implementation of the browser surface.
//!
//! Drives a single headless browser over the DevTools protocol. Pages are
//! tracked by session id; all page interaction goes through JavaScript
//! evaluation so the surface works against arbitrary directory forms.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::catalog::BusinessProfile;
use crate::error_handling::{SkipReason, SubmissionError};

use super::{BrowserSurface, FillOutcome, SessionHandle, SkipProbe};

/// Browser surface backed by a headless Chromium instance.
pub struct ChromiumSurface {
    browser: Browser,
    pages: Mutex<HashMap<u64, Page>>,
    next_id: AtomicU64,
}

impl ChromiumSurface {
    /// Launches a headless browser and returns the surface.
    ///
    /// The DevTools event handler is drained on a background task for the
    /// life of the browser.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .new_headless_mode()
            .args(vec![
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--remote-debugging-port=0",
            ])
            .build()
            .map_err(|e| anyhow!("Failed to configure headless browser: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch headless browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("Headless browser launched");
        Ok(ChromiumSurface {
            browser,
            pages: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    async fn page_for(&self, session: &SessionHandle) -> Result<Page> {
        let pages = self.pages.lock().await;
        pages
            .get(&session.id)
            .cloned()
            .ok_or_else(|| anyhow!("No open page for session {}", session.id))
    }
}

#[async_trait]
impl BrowserSurface for ChromiumSurface {
    async fn open_session(&self, url: &str) -> Result<SessionHandle> {
        let page = self
            .browser
            .new_page(url)
            .await
            .with_context(|| format!("Failed to open page at {url}"))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().await.insert(id, page);
        debug!("Opened session {} at {}", id, url);

        Ok(SessionHandle {
            id,
            url: url.to_string(),
        })
    }

    async fn wait_for_load(&self, session: &SessionHandle, timeout: Duration) -> Result<()> {
        let page = self.page_for(session).await?;
        tokio::time::timeout(timeout, page.wait_for_navigation())
            .await
            .map_err(|_| SubmissionError::Timeout(timeout))?
            .with_context(|| format!("Navigation failed for {}", session.url))?;
        Ok(())
    }

    async fn evaluate_skip_indicators(&self, session: &SessionHandle) -> Result<SkipProbe> {
        let page = self.page_for(session).await?;
        let verdict: serde_json::Value = page
            .evaluate(SKIP_PROBE_JS)
            .await
            .context("Skip probe script failed")?
            .into_value()
            .context("Skip probe returned a non-JSON value")?;

        let reason = verdict.get("reason").and_then(|r| r.as_str());
        let probe = match reason {
            Some("login") => SkipProbe::matched(SkipReason::LoginRequired),
            Some("paywall") => SkipProbe::matched(SkipReason::Paywall),
            Some("captcha") => SkipProbe::matched(SkipReason::CaptchaPresent),
            _ => SkipProbe::clear(),
        };
        if probe.skip {
            debug!(
                "Session {}: skip indicator matched ({:?})",
                session.id, probe.reason
            );
        }
        Ok(probe)
    }

    async fn fill_fields(
        &self,
        session: &SessionHandle,
        mapping: &BTreeMap<String, String>,
        profile: &BusinessProfile,
    ) -> Result<FillOutcome> {
        let page = self.page_for(session).await?;

        // Pair each locator with its payload value up front; fields without a
        // payload value are left untouched rather than cleared.
        let mut entries = Vec::new();
        for (field, locator) in mapping {
            if let Some(value) = profile.field(field) {
                entries.push(serde_json::json!({
                    "field": field,
                    "selector": locator,
                    "value": value,
                }));
            } else {
                warn!(
                    "No profile value for mapped field '{}', leaving it empty",
                    field
                );
            }
        }

        let script = format!(
            "{}({})",
            FILL_FIELDS_JS,
            serde_json::to_string(&entries).context("Failed to encode field entries")?
        );

        let result: serde_json::Value = page
            .evaluate(script)
            .await
            .context("Field-fill script failed")?
            .into_value()
            .context("Field-fill script returned a non-JSON value")?;

        let filled = result
            .get("filled")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let missing: Vec<String> = result
            .get("missing")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if missing.is_empty() {
            Ok(FillOutcome {
                success: true,
                fields_filled: filled,
                error: None,
            })
        } else {
            Ok(FillOutcome {
                success: false,
                fields_filled: filled,
                error: Some(format!("element not found for: {}", missing.join(", "))),
            })
        }
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<()> {
        let page = self.pages.lock().await.remove(&session.id);
        match page {
            Some(page) => {
                page.close()
                    .await
                    .with_context(|| format!("Failed to close session {}", session.id))?;
                debug!("Closed session {}", session.id);
                Ok(())
            }
            None => {
                // Already closed; closing twice is a bug upstream but not
                // worth failing a job over.
                warn!("close_session called twice for session {}", session.id);
                Ok(())
            }
        }
    }
}

/// Probes the DOM for conditions that make submission pointless.
///
/// Returns `{reason: "login" | "paywall" | "captcha" | null}`.
const SKIP_PROBE_JS: &str = r#"
(() => {
    const text = document.body ? document.body.innerText.toLowerCase() : '';
    const captchaFrame = document.querySelector(
        "iframe[src*='recaptcha'], iframe[src*='hcaptcha'], iframe[src*='turnstile'], .g-recaptcha, .h-captcha"
    );
    if (captchaFrame || text.includes('verify you are human')) {
        return { reason: 'captcha' };
    }
    const password = document.querySelector("input[type='password']");
    if (password || text.includes('sign in to continue') || text.includes('log in to continue')) {
        return { reason: 'login' };
    }
    if (text.includes('subscribe to continue') || text.includes('premium members only')) {
        return { reason: 'paywall' };
    }
    return { reason: null };
})
()"#;

/// Fills each entry's selector with its value and reports what was missing.
///
/// Dispatches `input` and `change` events so framework-bound forms observe
/// the values.
const FILL_FIELDS_JS: &str = r#"
((entries) => {
    const missing = [];
    let filled = 0;
    for (const entry of entries) {
        const el = document.querySelector(entry.selector);
        if (!el) {
            missing.push(entry.field);
            continue;
        }
        if (el.tagName === 'SELECT') {
            for (const option of el.options) {
                if (option.value === entry.value || option.text === entry.value) {
                    el.value = option.value;
                    break;
                }
            }
        } else {
            el.value = entry.value;
        }
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
        filled += 1;
    }
    return { filled: filled, missing: missing };
})"#;
