//! Submission jobs and their state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};

use crate::catalog::{BusinessProfile, DirectoryDescriptor, Tier};
use crate::error_handling::{ErrorCategory, SkipReason};

/// Job identifier (`job_<n>`).
pub type JobId = String;

/// Lifecycle state of a job.
///
/// `Pending → Processing → {Completed, Failed, Skipped}`, with
/// `Processing → Retrying → Processing` as the bounded retry loop. A job in
/// a terminal state never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Retrying,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

/// One recorded failure during a job's attempts.
#[derive(Debug, Clone)]
pub struct JobError {
    pub category: ErrorCategory,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// One attempt to submit business data to one directory.
///
/// Owned exclusively by the queue engine; everyone else sees terminal
/// outcomes through the archive.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub descriptor: Arc<DirectoryDescriptor>,
    pub profile: Arc<BusinessProfile>,
    pub status: JobStatus,
    pub retry_count: u32,
    /// Effective priority: the directory's tier unless overridden at
    /// enqueue time.
    pub priority: Tier,
    /// FIFO sequence within the queue, assigned at enqueue time.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub errors: Vec<JobError>,
    /// Skip reason when the job ended `Skipped`.
    pub skip_reason: Option<SkipReason>,
}

impl Job {
    pub fn new(
        id: JobId,
        seq: u64,
        descriptor: Arc<DirectoryDescriptor>,
        profile: Arc<BusinessProfile>,
    ) -> Self {
        let priority = descriptor.tier;
        Job {
            id,
            descriptor,
            profile,
            status: JobStatus::Pending,
            retry_count: 0,
            priority,
            seq,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            errors: Vec::new(),
            skip_reason: None,
        }
    }

    fn guarded_transition(&mut self, from: &[JobStatus], to: JobStatus) -> bool {
        if !from.contains(&self.status) {
            // A second terminal transition (or any other illegal edge) is a
            // bug in the drain loop; refuse it rather than corrupt counters.
            error!(
                "Illegal job transition for {}: {} -> {}",
                self.id,
                self.status.as_str(),
                to.as_str()
            );
            return false;
        }
        self.status = to;
        true
    }

    /// `Pending`/`Retrying` → `Processing`. Stamps `started_at` on the first
    /// attempt.
    pub fn begin_attempt(&mut self) -> bool {
        let ok = self.guarded_transition(
            &[JobStatus::Pending, JobStatus::Retrying],
            JobStatus::Processing,
        );
        if ok && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        ok
    }

    /// `Processing` → `Completed`.
    pub fn complete(&mut self) -> bool {
        let ok = self.guarded_transition(&[JobStatus::Processing], JobStatus::Completed);
        if ok {
            self.ended_at = Some(Utc::now());
        }
        ok
    }

    /// `Processing`/`Retrying` → `Failed`, recording the final error.
    ///
    /// Failing from `Retrying` covers cancellation while waiting out a
    /// backoff delay.
    pub fn fail(&mut self, category: ErrorCategory, message: impl Into<String>) -> bool {
        let ok = self.guarded_transition(
            &[JobStatus::Processing, JobStatus::Retrying],
            JobStatus::Failed,
        );
        if ok {
            self.errors.push(JobError {
                category,
                message: message.into(),
                at: Utc::now(),
            });
            self.ended_at = Some(Utc::now());
        }
        ok
    }

    /// `Pending`/`Processing` → `Skipped`.
    ///
    /// Skips from `Pending` are pre-flight decisions made without spending a
    /// browser session.
    pub fn skip(&mut self, reason: SkipReason) -> bool {
        let ok = self.guarded_transition(
            &[JobStatus::Pending, JobStatus::Processing],
            JobStatus::Skipped,
        );
        if ok {
            self.skip_reason = Some(reason);
            self.ended_at = Some(Utc::now());
        }
        ok
    }

    /// `Processing` → `Retrying`, recording the attempt's error and bumping
    /// the retry count.
    pub fn schedule_retry(&mut self, category: ErrorCategory, message: impl Into<String>) -> bool {
        let ok = self.guarded_transition(&[JobStatus::Processing], JobStatus::Retrying);
        if ok {
            self.errors.push(JobError {
                category,
                message: message.into(),
                at: Utc::now(),
            });
            self.retry_count += 1;
        }
        ok
    }

    /// Classification of the last recorded error, if any.
    pub fn last_error_category(&self) -> Option<ErrorCategory> {
        self.errors.last().map(|e| e.category)
    }

    /// Converts a terminal job into its archive record.
    pub fn into_outcome(self) -> JobOutcome {
        let elapsed_seconds = match (self.started_at, self.ended_at) {
            (Some(started), Some(ended)) => (ended - started).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        JobOutcome {
            job_id: self.id,
            directory_id: self.descriptor.id.clone(),
            status: self.status,
            category: self.errors.last().map(|e| e.category),
            error: self.errors.last().map(|e| e.message.clone()),
            skip_reason: self.skip_reason.map(|r| r.as_str().to_string()),
            retry_count: self.retry_count,
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            elapsed_seconds,
        }
    }
}

/// Archive record for a terminal job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub directory_id: String,
    pub status: JobStatus,
    pub category: Option<ErrorCategory>,
    pub error: Option<String>,
    pub skip_reason: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Difficulty, Tier};

    fn job() -> Job {
        let descriptor = Arc::new(DirectoryDescriptor {
            id: "dir-a".into(),
            name: "Directory A".into(),
            submission_url: "https://a.example.com/submit".into(),
            category: "general".into(),
            tier: Tier::High,
            field_mapping: Default::default(),
            flags: Default::default(),
            difficulty: Difficulty::Easy,
            domain_authority: 10,
        });
        Job::new("job_1".into(), 1, descriptor, Arc::new(BusinessProfile::default()))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut j = job();
        assert!(j.begin_attempt());
        assert_eq!(j.status, JobStatus::Processing);
        assert!(j.started_at.is_some());
        assert!(j.complete());
        assert_eq!(j.status, JobStatus::Completed);
        assert!(j.ended_at.is_some());
    }

    #[test]
    fn test_no_second_terminal_transition() {
        let mut j = job();
        assert!(j.begin_attempt());
        assert!(j.complete());
        // Any further transition must be refused.
        assert!(!j.fail(ErrorCategory::Network, "late failure"));
        assert!(!j.skip(SkipReason::CaptchaPresent));
        assert!(!j.begin_attempt());
        assert_eq!(j.status, JobStatus::Completed);
    }

    #[test]
    fn test_retry_loop() {
        let mut j = job();
        assert!(j.begin_attempt());
        assert!(j.schedule_retry(ErrorCategory::Network, "connection reset"));
        assert_eq!(j.status, JobStatus::Retrying);
        assert_eq!(j.retry_count, 1);

        assert!(j.begin_attempt());
        assert!(j.fail(ErrorCategory::Network, "connection reset again"));
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.errors.len(), 2);
        assert_eq!(j.last_error_category(), Some(ErrorCategory::Network));
    }

    #[test]
    fn test_preflight_skip_from_pending() {
        let mut j = job();
        assert!(j.skip(SkipReason::DirectoryInaccessible));
        assert_eq!(j.status, JobStatus::Skipped);
        // Never entered Processing.
        assert!(j.started_at.is_none());
    }

    #[test]
    fn test_cannot_complete_from_pending() {
        let mut j = job();
        assert!(!j.complete());
        assert_eq!(j.status, JobStatus::Pending);
    }

    #[test]
    fn test_outcome_conversion() {
        let mut j = job();
        j.begin_attempt();
        j.schedule_retry(ErrorCategory::Timeout, "load timed out");
        j.begin_attempt();
        j.fail(ErrorCategory::Timeout, "load timed out again");

        let outcome = j.into_outcome();
        assert_eq!(outcome.status, JobStatus::Failed);
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.category, Some(ErrorCategory::Timeout));
        assert_eq!(outcome.directory_id, "dir-a");
        assert!(outcome.error.unwrap().contains("again"));
    }

    #[test]
    fn test_status_terminality() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }
}
