//! Execution of a single job attempt against the browser surface.
//!
//! The session-close guarantee lives here: a session handle is parked in a
//! shared slot immediately after opening, and whoever takes it out of the
//! slot closes it. Normal and error paths take it at the end of the attempt;
//! the abort path (watchdog or operator stop) takes it after cancelling the
//! attempt future. Either way the session is closed exactly once.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};

use crate::browser::{BrowserSurface, SessionHandle};
use crate::catalog::{BusinessProfile, DirectoryDescriptor};
use crate::config::Config;
use crate::error_handling::{SkipReason, SubmissionError};

/// How one attempt ended, short of an error.
#[derive(Debug)]
pub(crate) enum AttemptResult {
    /// Fields were filled successfully.
    Submitted,
    /// A skip indicator matched; terminal non-error.
    Skipped(SkipReason),
}

/// Shared parking slot for the attempt's open session.
///
/// A synchronous mutex on purpose: parking and taking must not be
/// cancellation points, otherwise an abort landing between `open_session`
/// and the park would leak the session.
pub(crate) type SessionSlot = Arc<Mutex<Option<SessionHandle>>>;

fn park(slot: &SessionSlot, session: SessionHandle) {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session);
}

fn take(slot: &SessionSlot) -> Option<SessionHandle> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

/// Runs one attempt end to end: open, wait for load, probe skip indicators,
/// fill fields, close.
pub(crate) async fn execute_attempt(
    surface: &Arc<dyn BrowserSurface>,
    descriptor: &DirectoryDescriptor,
    profile: &BusinessProfile,
    config: &Config,
    session_slot: &SessionSlot,
) -> Result<AttemptResult> {
    let session = surface
        .open_session(&descriptor.submission_url)
        .await
        .with_context(|| format!("Failed to open session for {}", descriptor.id))?;
    park(session_slot, session.clone());
    debug!("Job session open for {} ({})", descriptor.id, session.url);

    let result = drive_session(surface, &session, descriptor, profile, config).await;

    // Close on every non-abort path. If the slot is empty the abort path
    // already took ownership.
    if let Some(handle) = take(session_slot) {
        if let Err(e) = surface.close_session(&handle).await {
            warn!("Failed to close session for {}: {}", descriptor.id, e);
        }
    }

    result
}

/// Force-closes whatever session is parked in the slot, if any.
///
/// Called by the abort path after the attempt future has been dropped.
pub(crate) async fn force_close_session(
    surface: &Arc<dyn BrowserSurface>,
    session_slot: &SessionSlot,
    directory_id: &str,
) {
    if let Some(handle) = take(session_slot) {
        warn!("Force-closing session for {}", directory_id);
        if let Err(e) = surface.close_session(&handle).await {
            warn!("Failed to force-close session for {}: {}", directory_id, e);
        }
    }
}

async fn drive_session(
    surface: &Arc<dyn BrowserSurface>,
    session: &SessionHandle,
    descriptor: &DirectoryDescriptor,
    profile: &BusinessProfile,
    config: &Config,
) -> Result<AttemptResult> {
    surface
        .wait_for_load(session, config.page_load_timeout)
        .await
        .with_context(|| format!("Page load failed for {}", descriptor.id))?;

    let probe = surface
        .evaluate_skip_indicators(session)
        .await
        .with_context(|| format!("Skip probe failed for {}", descriptor.id))?;
    if probe.skip {
        let reason = probe.reason.unwrap_or(SkipReason::LoginRequired);
        return Ok(AttemptResult::Skipped(reason));
    }

    let outcome = tokio::time::timeout(
        config.field_fill_timeout,
        surface.fill_fields(session, &descriptor.field_mapping, profile),
    )
    .await
    .map_err(|_| SubmissionError::Timeout(config.field_fill_timeout))?
    .with_context(|| format!("Field fill failed for {}", descriptor.id))?;

    if outcome.success {
        debug!(
            "Filled {} fields for {}",
            outcome.fields_filled, descriptor.id
        );
        Ok(AttemptResult::Submitted)
    } else {
        Err(anyhow!(
            "field fill failed for {}: {}",
            descriptor.id,
            outcome.error.unwrap_or_else(|| "unspecified error".into())
        ))
    }
}
