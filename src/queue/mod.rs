//! Submission queue engine.
//!
//! Turns a list of target directories into a priority-ordered stream of
//! jobs, executes them one per concurrency slot against the browser
//! automation surface, and recovers from partial failure (network errors,
//! stuck pages, anti-automation defenses) without operator intervention.
//!
//! Ordering is directory tier first (high > medium > low), FIFO within a
//! tier. Before spending a browser session on a job, the engine consults the
//! directory's latest health record; an unreachable directory or one whose
//! selector validity has collapsed gets the job skipped outright.

mod execute;
mod job;
mod watchdog;

pub use job::{Job, JobError, JobId, JobOutcome, JobStatus};

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alerts::{Alert, AlertDispatcher, AlertReason, AlertSink, Severity};
use crate::catalog::{BusinessProfile, Catalog, DirectoryDescriptor, Tier};
use crate::config::Config;
use crate::error_handling::{
    default_classifier, EngineStats, ErrorCategory, ErrorClassifier, SkipReason,
};
use crate::health::{HealthStatus, HealthView};
use crate::browser::BrowserSurface;
use crate::storage::{CounterSnapshot, PendingJobRecord, QueueSnapshot, QueueStore};
use crate::utils::{backoff_delay, jittered_delay, retry_budget, retry_with_backoff, sleep_jittered};

use execute::{AttemptResult, SessionSlot};
use watchdog::{ActiveJob, REASON_STOPPED, REASON_WATCHDOG};

/// Aggregate queue counters plus the currently active jobs.
#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retried: usize,
    pub active: Vec<JobId>,
}

#[derive(Default)]
struct QueueCounters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    retried: AtomicUsize,
}

impl QueueCounters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            retried: self.retried.load(Ordering::SeqCst),
        }
    }

    fn restore(&self, snapshot: &CounterSnapshot) {
        self.succeeded.store(snapshot.succeeded, Ordering::SeqCst);
        self.failed.store(snapshot.failed, Ordering::SeqCst);
        self.skipped.store(snapshot.skipped, Ordering::SeqCst);
        self.retried.store(snapshot.retried, Ordering::SeqCst);
    }
}

/// Heap wrapper ordering jobs by (priority, FIFO sequence).
struct PendingJob(Job);

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.seq == other.0.seq
    }
}

impl Eq for PendingJob {}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority first, then lower sequence (FIFO) first.
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

struct QueueInner {
    config: Config,
    surface: Arc<dyn BrowserSurface>,
    health: Option<HealthView>,
    classifier: ErrorClassifier,
    dispatcher: AlertDispatcher,
    stats: EngineStats,
    pending: Mutex<BinaryHeap<PendingJob>>,
    active: Mutex<HashMap<usize, ActiveJob>>,
    counters: QueueCounters,
    /// Jobs popped from the pending heap but not yet terminal. Covers the
    /// gap between popping and registering the attempt in `active`, so
    /// `status()` never undercounts in-flight work.
    in_flight: AtomicUsize,
    paused: AtomicBool,
    cancel: CancellationToken,
    next_id: AtomicU64,
    store: Option<QueueStore>,
}

/// The submission queue engine.
pub struct SubmissionQueue {
    inner: Arc<QueueInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SubmissionQueue {
    /// Creates a queue over the given browser surface.
    ///
    /// `health` enables the pre-flight check; `store` enables snapshots and
    /// the outcome archive. Both are optional so the engine stays usable in
    /// reduced setups (and in tests).
    pub fn new(
        config: Config,
        surface: Arc<dyn BrowserSurface>,
        sink: Arc<dyn AlertSink>,
        health: Option<HealthView>,
        store: Option<QueueStore>,
    ) -> Self {
        SubmissionQueue {
            inner: Arc::new(QueueInner {
                config,
                surface,
                health,
                classifier: default_classifier(),
                dispatcher: AlertDispatcher::new(sink),
                stats: EngineStats::new(),
                pending: Mutex::new(BinaryHeap::new()),
                active: Mutex::new(HashMap::new()),
                counters: QueueCounters::default(),
                in_flight: AtomicUsize::new(0),
                paused: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                next_id: AtomicU64::new(1),
                store,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the error classifier (tests inject deterministic ones).
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        // Safe before start(): nothing else holds the inner Arc yet.
        Arc::get_mut(&mut self.inner)
            .expect("with_classifier must be called before start()")
            .classifier = classifier;
        self
    }

    /// Adds one job for a directory and returns its id.
    ///
    /// `priority` overrides the directory's tier for queue ordering; `None`
    /// uses the tier as-is.
    pub async fn enqueue(
        &self,
        descriptor: Arc<DirectoryDescriptor>,
        profile: Arc<BusinessProfile>,
        priority: Option<Tier>,
    ) -> JobId {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let job_id = format!("job_{n}");
        let mut job = Job::new(job_id.clone(), n, descriptor, profile);
        if let Some(priority) = priority {
            job.priority = priority;
        }
        self.inner.pending.lock().await.push(PendingJob(job));
        job_id
    }

    /// Enqueues the whole catalog in submission order (tier, then domain
    /// authority) for one business profile.
    pub async fn enqueue_catalog(
        &self,
        catalog: &Catalog,
        profile: Arc<BusinessProfile>,
    ) -> Vec<JobId> {
        let mut ids = Vec::new();
        for descriptor in catalog.submission_order() {
            ids.push(self.enqueue(descriptor, Arc::clone(&profile), None).await);
        }
        info!("Enqueued {} jobs from catalog", ids.len());
        ids
    }

    /// Restores pending jobs and counters from the latest snapshot.
    ///
    /// Returns the number of jobs restored. Directory ids that no longer
    /// exist in the catalog are dropped with a warning.
    pub async fn restore_from_snapshot(&self, catalog: &Catalog) -> Result<usize> {
        let Some(store) = &self.inner.store else {
            return Ok(0);
        };
        let Some(snapshot) = store
            .load_latest_snapshot()
            .await
            .context("Failed to load queue snapshot")?
        else {
            return Ok(0);
        };

        self.inner.counters.restore(&snapshot.counters);

        let mut max_seq = 0;
        let mut restored = 0;
        let mut pending = self.inner.pending.lock().await;
        for record in snapshot.pending {
            let Some(descriptor) = catalog.get(&record.directory_id) else {
                warn!(
                    "Dropping snapshotted job {}: directory '{}' no longer in catalog",
                    record.job_id, record.directory_id
                );
                continue;
            };
            max_seq = max_seq.max(record.seq);
            let mut job = Job::new(
                record.job_id,
                record.seq,
                Arc::clone(descriptor),
                Arc::new(record.profile),
            );
            if let Some(priority) = record.priority {
                job.priority = priority;
            }
            pending.push(PendingJob(job));
            restored += 1;
        }
        drop(pending);

        self.inner
            .next_id
            .fetch_max(max_seq + 1, Ordering::SeqCst);
        info!("Restored {} pending jobs from snapshot", restored);
        Ok(restored)
    }

    /// Begins draining the queue: spawns the slot workers, the watchdog
    /// sweep, and the snapshot task.
    pub async fn start(&self) {
        let slots = self.inner.config.concurrency_slots.max(1);
        let mut tasks = self.tasks.lock().await;
        for slot in 0..slots {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(async move {
                worker_loop(inner, slot).await;
            }));
        }

        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(async move {
            watchdog_loop(inner).await;
        }));

        if self.inner.store.is_some() {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(async move {
                snapshot_loop(inner).await;
            }));
        }

        info!("Submission queue started with {} slot(s)", slots);
    }

    /// Lets the in-flight job finish but prevents new jobs from starting.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        info!("Submission queue paused");
    }

    /// Resumes draining after a pause.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        info!("Submission queue resumed");
    }

    /// Stops the engine: force-closes any in-flight browser session, marks
    /// active jobs failed with a cancellation reason, writes a final
    /// snapshot, and waits for the background tasks to exit.
    pub async fn stop(&self) {
        info!("Submission queue stopping");
        // Abort in-flight attempts first so their jobs reach a terminal
        // state before the workers observe the cancel token.
        {
            let active = self.inner.active.lock().await;
            for entry in active.values() {
                entry.abort_with_reason(REASON_STOPPED);
            }
        }
        self.inner.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }

        self.inner.write_snapshot().await;
        self.inner.stats.log_summary();
        info!("Submission queue stopped");
    }

    /// Current aggregate counters and active jobs.
    pub async fn status(&self) -> QueueStatus {
        let pending = self.inner.pending.lock().await.len();
        let active: Vec<JobId> = self
            .inner
            .active
            .lock()
            .await
            .values()
            .map(|a| a.job_id.clone())
            .collect();
        let counters = self.inner.counters.snapshot();
        QueueStatus {
            pending,
            processing: self.inner.in_flight.load(Ordering::SeqCst),
            succeeded: counters.succeeded,
            failed: counters.failed,
            skipped: counters.skipped,
            retried: counters.retried,
            active,
        }
    }

    /// Waits until the queue is fully drained (no pending, no in-flight) or
    /// the engine is stopped.
    pub async fn run_until_drained(&self) -> QueueStatus {
        loop {
            if self.inner.cancel.is_cancelled() {
                break;
            }
            let status = self.status().await;
            if status.pending == 0 && status.processing == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        self.status().await
    }
}

async fn worker_loop(inner: Arc<QueueInner>, slot: usize) {
    loop {
        if inner.cancel.is_cancelled() {
            break;
        }
        if inner.paused.load(Ordering::SeqCst) {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(100)) => continue,
                _ = inner.cancel.cancelled() => break,
            }
        }

        // The in-flight count moves up while the heap lock is still held, so
        // a status() reader never observes the popped job as neither pending
        // nor processing.
        let job = {
            let mut pending = inner.pending.lock().await;
            let job = pending.pop().map(|p| p.0);
            if job.is_some() {
                inner.in_flight.fetch_add(1, Ordering::SeqCst);
            }
            job
        };
        let Some(job) = job else {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => continue,
                _ = inner.cancel.cancelled() => break,
            }
        };

        inner.process_job(job, slot).await;
        inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        // Human-paced gap between jobs; also applies after a skip so the
        // cadence stays irregular.
        tokio::select! {
            _ = sleep_jittered(
                inner.config.inter_job_base_delay,
                inner.config.inter_job_jitter,
            ) => {}
            _ = inner.cancel.cancelled() => break,
        }
    }
    log::debug!("Queue worker {} exited", slot);
}

async fn watchdog_loop(inner: Arc<QueueInner>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(inner.config.watchdog_interval) => {
                watchdog::sweep_once(&inner.active, inner.config.job_processing_timeout).await;
            }
            _ = inner.cancel.cancelled() => break,
        }
    }
}

async fn snapshot_loop(inner: Arc<QueueInner>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(inner.config.snapshot_interval) => {
                inner.write_snapshot().await;
            }
            _ = inner.cancel.cancelled() => break,
        }
    }
}

enum AttemptEnd {
    Finished(Result<AttemptResult>),
    Aborted,
}

impl QueueInner {
    /// Drives one job to a terminal state, including its retry loop.
    async fn process_job(&self, mut job: Job, slot: usize) {
        // Cheap pre-flight: consult the latest health record before spending
        // a browser session.
        if let Some(reason) = self.preflight_skip_reason(&job.descriptor).await {
            info!(
                "Skipping job {} for {} before processing: {}",
                job.id, job.descriptor.id, reason
            );
            job.skip(reason);
            self.counters.skipped.fetch_add(1, Ordering::SeqCst);
            self.archive(job).await;
            return;
        }

        loop {
            if !job.begin_attempt() {
                break;
            }

            let abort = CancellationToken::new();
            let session_slot: SessionSlot = Arc::new(std::sync::Mutex::new(None));
            {
                self.active.lock().await.insert(
                    slot,
                    ActiveJob {
                        job_id: job.id.clone(),
                        directory_id: job.descriptor.id.clone(),
                        started: Instant::now(),
                        abort: abort.clone(),
                        abort_reason: std::sync::Mutex::new(None),
                        session_slot: Arc::clone(&session_slot),
                    },
                );
            }

            let end = tokio::select! {
                result = execute::execute_attempt(
                    &self.surface,
                    &job.descriptor,
                    &job.profile,
                    &self.config,
                    &session_slot,
                ) => AttemptEnd::Finished(result),
                _ = abort.cancelled() => AttemptEnd::Aborted,
                // stop() may race with attempt registration; the engine token
                // catches attempts its abort sweep never saw.
                _ = self.cancel.cancelled() => AttemptEnd::Aborted,
            };

            let entry = self.active.lock().await.remove(&slot);

            match end {
                AttemptEnd::Finished(Ok(AttemptResult::Submitted)) => {
                    info!("Job {} completed for {}", job.id, job.descriptor.id);
                    job.complete();
                    self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                AttemptEnd::Finished(Ok(AttemptResult::Skipped(reason))) => {
                    info!(
                        "Job {} skipped for {}: {}",
                        job.id, job.descriptor.id, reason
                    );
                    job.skip(reason);
                    self.counters.skipped.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                AttemptEnd::Finished(Err(e)) => {
                    let category = (self.classifier)(&e);
                    self.stats.increment(category);
                    let budget = retry_budget(category, &self.config);

                    if category.is_retriable() && job.retry_count < budget {
                        warn!(
                            "Job {} attempt failed ({}): {:#}; retry {}/{}",
                            job.id,
                            category,
                            e,
                            job.retry_count + 1,
                            budget
                        );
                        job.schedule_retry(category, format!("{e:#}"));
                        self.counters.retried.fetch_add(1, Ordering::SeqCst);

                        let delay = jittered_delay(
                            backoff_delay(job.retry_count),
                            self.config.inter_job_jitter,
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => continue,
                            _ = self.cancel.cancelled() => {
                                self.fail_job(&mut job, ErrorCategory::Unknown, REASON_STOPPED)
                                    .await;
                                break;
                            }
                        }
                    } else {
                        self.fail_job(&mut job, category, format!("{e:#}")).await;
                        break;
                    }
                }
                AttemptEnd::Aborted => {
                    let reason = entry
                        .as_ref()
                        .and_then(|e| e.recorded_abort_reason())
                        .unwrap_or(if self.cancel.is_cancelled() {
                            REASON_STOPPED
                        } else {
                            REASON_WATCHDOG
                        });
                    execute::force_close_session(&self.surface, &session_slot, &job.descriptor.id)
                        .await;
                    let category = if reason == REASON_STOPPED {
                        ErrorCategory::Unknown
                    } else {
                        ErrorCategory::Timeout
                    };
                    self.stats.increment(category);
                    self.fail_job(&mut job, category, reason).await;
                    break;
                }
            }
        }

        self.archive(job).await;
    }

    async fn preflight_skip_reason(
        &self,
        descriptor: &DirectoryDescriptor,
    ) -> Option<SkipReason> {
        let health = self.health.as_ref()?;
        let record = health.get(&descriptor.id).await?;
        if record.status == HealthStatus::Inaccessible {
            return Some(SkipReason::DirectoryInaccessible);
        }
        if record.validity_ratio() < self.config.preflight_validity_floor {
            return Some(SkipReason::LowSelectorValidity);
        }
        None
    }

    async fn fail_job(&self, job: &mut Job, category: ErrorCategory, message: impl Into<String>) {
        let message = message.into();
        warn!(
            "Job {} failed for {} ({}): {}",
            job.id, job.descriptor.id, category, message
        );
        job.fail(category, message.clone());
        self.counters.failed.fetch_add(1, Ordering::SeqCst);

        // Terminal failures go to the sink with enough context to triage
        // without re-running the job.
        self.dispatcher
            .dispatch(Alert::new(
                &job.descriptor.id,
                Severity::Warning,
                AlertReason::SubmissionFailed,
                format!(
                    "job {} failed after {} retries ({}): {}",
                    job.id, job.retry_count, category, message
                ),
            ))
            .await;
    }

    async fn archive(&self, job: Job) {
        let outcome = job.into_outcome();
        if let Some(store) = &self.store {
            let result = retry_with_backoff(2, || {
                let store = store.clone();
                let outcome = outcome.clone();
                async move {
                    store.record_outcome(&outcome).await?;
                    Ok(())
                }
            })
            .await;
            if let Err(e) = result {
                warn!("Failed to archive outcome for {}: {:#}", outcome.job_id, e);
            }
        }
    }

    async fn write_snapshot(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let pending: Vec<PendingJobRecord> = {
            let heap = self.pending.lock().await;
            heap.iter()
                .map(|p| PendingJobRecord {
                    job_id: p.0.id.clone(),
                    seq: p.0.seq,
                    directory_id: p.0.descriptor.id.clone(),
                    priority: Some(p.0.priority),
                    profile: (*p.0.profile).clone(),
                })
                .collect()
        };
        let snapshot = QueueSnapshot {
            taken_ms: QueueStore::now_ms(),
            pending,
            counters: self.counters.snapshot(),
        };
        if let Err(e) = store.write_snapshot(&snapshot).await {
            warn!("Failed to write queue snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Difficulty, Tier};

    fn descriptor(id: &str, tier: Tier) -> Arc<DirectoryDescriptor> {
        Arc::new(DirectoryDescriptor {
            id: id.into(),
            name: id.into(),
            submission_url: format!("https://{id}.example.com/submit"),
            category: "general".into(),
            tier,
            field_mapping: Default::default(),
            flags: Default::default(),
            difficulty: Difficulty::Easy,
            domain_authority: 10,
        })
    }

    fn pending(id: &str, tier: Tier, seq: u64) -> PendingJob {
        PendingJob(Job::new(
            format!("job_{seq}"),
            seq,
            descriptor(id, tier),
            Arc::new(BusinessProfile::default()),
        ))
    }

    #[test]
    fn test_heap_orders_by_tier_then_fifo() {
        let mut heap = BinaryHeap::new();
        heap.push(pending("low-first", Tier::Low, 1));
        heap.push(pending("high-late", Tier::High, 5));
        heap.push(pending("high-early", Tier::High, 2));
        heap.push(pending("medium", Tier::Medium, 3));

        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|p| p.0.descriptor.id.clone())
            .collect();
        assert_eq!(order, vec!["high-early", "high-late", "medium", "low-first"]);
    }

    #[test]
    fn test_counters_snapshot_restore() {
        let counters = QueueCounters::default();
        counters.succeeded.store(5, Ordering::SeqCst);
        counters.retried.store(2, Ordering::SeqCst);

        let snap = counters.snapshot();
        let fresh = QueueCounters::default();
        fresh.restore(&snap);
        assert_eq!(fresh.succeeded.load(Ordering::SeqCst), 5);
        assert_eq!(fresh.retried.load(Ordering::SeqCst), 2);
        assert_eq!(fresh.failed.load(Ordering::SeqCst), 0);
    }
}
