//! Stuck-job recovery.
//!
//! An independent periodic sweep inspects the actively processing jobs. Any
//! job running past the per-job processing timeout gets its abort token
//! cancelled; the drain loop then force-closes the browser session and marks
//! the job failed with reason "exceeded maximum processing time". This
//! guarantees forward progress even when a browser session hangs
//! indefinitely.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::warn;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::queue::execute::SessionSlot;
use crate::queue::job::JobId;

/// Reason recorded when an attempt is aborted from outside.
pub(crate) const REASON_WATCHDOG: &str = "exceeded maximum processing time";
pub(crate) const REASON_STOPPED: &str = "cancelled by operator stop";

/// Bookkeeping for one in-flight attempt.
pub(crate) struct ActiveJob {
    pub job_id: JobId,
    pub directory_id: String,
    pub started: Instant,
    /// Cancelled by the watchdog or `stop()` to abort the attempt future.
    pub abort: CancellationToken,
    /// Why the attempt was aborted, set before cancelling `abort`.
    pub abort_reason: std::sync::Mutex<Option<&'static str>>,
    /// The attempt's parked session handle, for force-close.
    pub session_slot: SessionSlot,
}

impl ActiveJob {
    /// Aborts this attempt with the given reason. Idempotent: the first
    /// reason wins.
    pub fn abort_with_reason(&self, reason: &'static str) {
        {
            let mut slot = self
                .abort_reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.abort.cancel();
    }

    /// The reason this attempt was aborted, if one was recorded.
    pub fn recorded_abort_reason(&self) -> Option<&'static str> {
        *self
            .abort_reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sweeps the active-job table once, aborting attempts past the timeout.
///
/// Returns the ids of the jobs it aborted (for logging and tests).
pub(crate) async fn sweep_once(
    active: &Mutex<HashMap<usize, ActiveJob>>,
    processing_timeout: Duration,
) -> Vec<JobId> {
    let mut aborted = Vec::new();
    let table = active.lock().await;
    for entry in table.values() {
        if entry.started.elapsed() > processing_timeout {
            warn!(
                "Watchdog: job {} on {} has run {:.0}s (limit {:.0}s), force-closing its session",
                entry.job_id,
                entry.directory_id,
                entry.started.elapsed().as_secs_f64(),
                processing_timeout.as_secs_f64()
            );
            entry.abort_with_reason(REASON_WATCHDOG);
            aborted.push(entry.job_id.clone());
        }
    }
    aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn active_job(started: Instant) -> ActiveJob {
        ActiveJob {
            job_id: "job_1".into(),
            directory_id: "dir-a".into(),
            started,
            abort: CancellationToken::new(),
            abort_reason: std::sync::Mutex::new(None),
            session_slot: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    #[tokio::test]
    async fn test_sweep_ignores_fresh_jobs() {
        let active = Mutex::new(HashMap::from([(0usize, active_job(Instant::now()))]));
        let aborted = sweep_once(&active, Duration::from_secs(60)).await;
        assert!(aborted.is_empty());
        assert!(!active.lock().await[&0].abort.is_cancelled());
    }

    #[tokio::test]
    async fn test_sweep_aborts_overrunning_job() {
        let stale = Instant::now() - Duration::from_secs(120);
        let active = Mutex::new(HashMap::from([(0usize, active_job(stale))]));
        let aborted = sweep_once(&active, Duration::from_secs(60)).await;
        assert_eq!(aborted, vec!["job_1".to_string()]);
        let table = active.lock().await;
        assert!(table[&0].abort.is_cancelled());
        assert_eq!(table[&0].recorded_abort_reason(), Some(REASON_WATCHDOG));
    }

    #[tokio::test]
    async fn test_first_abort_reason_wins() {
        let job = active_job(Instant::now());
        job.abort_with_reason(REASON_STOPPED);
        job.abort_with_reason(REASON_WATCHDOG);
        assert_eq!(job.recorded_abort_reason(), Some(REASON_STOPPED));
    }
}
