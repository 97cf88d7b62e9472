//! Browser automation surface.
//!
//! The queue engine talks to the browser exclusively through the
//! [`BrowserSurface`] trait: a typed request/response seam where every
//! operation carries an explicit deadline and a typed result. The engine
//! guarantees `close_session` is called on every code path, success or
//! failure.

mod chromium;

pub use chromium::ChromiumSurface;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::BusinessProfile;
use crate::error_handling::SkipReason;

/// Handle to one open browser session (one page context).
///
/// Cheap to clone; the surface resolves the id back to its page. Cloning the
/// handle does not duplicate the underlying session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: u64,
    pub url: String,
}

/// Result of probing a loaded page for conditions that make submission
/// pointless (login wall, paywall, CAPTCHA).
#[derive(Debug, Clone, Copy)]
pub struct SkipProbe {
    pub skip: bool,
    pub reason: Option<SkipReason>,
}

impl SkipProbe {
    /// A probe that found nothing blocking.
    pub fn clear() -> Self {
        SkipProbe {
            skip: false,
            reason: None,
        }
    }

    /// A probe that matched a skip indicator.
    pub fn matched(reason: SkipReason) -> Self {
        SkipProbe {
            skip: true,
            reason: Some(reason),
        }
    }
}

/// Result of a field-filling operation.
#[derive(Debug, Clone)]
pub struct FillOutcome {
    pub success: bool,
    /// Number of fields actually filled.
    pub fields_filled: usize,
    /// Error description when `success` is false.
    pub error: Option<String>,
}

/// The browser automation surface consumed by the queue engine.
///
/// One implementation drives a real headless browser
/// ([`ChromiumSurface`]); tests inject scripted fakes. The surface is a
/// scarce, stateful resource: callers must treat sessions as exclusive and
/// close every session they open.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    /// Opens a new session navigated to `url`.
    async fn open_session(&self, url: &str) -> Result<SessionHandle>;

    /// Waits for the session's page to finish loading, bounded by `timeout`.
    async fn wait_for_load(&self, session: &SessionHandle, timeout: Duration) -> Result<()>;

    /// Probes the loaded page for skip indicators.
    async fn evaluate_skip_indicators(&self, session: &SessionHandle) -> Result<SkipProbe>;

    /// Fills the mapped form fields from the profile payload.
    async fn fill_fields(
        &self,
        session: &SessionHandle,
        mapping: &BTreeMap<String, String>,
        profile: &BusinessProfile,
    ) -> Result<FillOutcome>;

    /// Closes a session. Must be safe to call exactly once per open.
    async fn close_session(&self, session: &SessionHandle) -> Result<()>;
}
