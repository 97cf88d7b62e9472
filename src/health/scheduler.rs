//! Adaptive check scheduling.
//!
//! Directories are assigned a check interval by priority tier; the scheduler
//! keeps a pending-task heap ordered by (scheduled time, priority) and
//! reschedules each directory after its check completes, a self-renewing
//! cycle rather than a fixed cron grid. When observed check durations trend
//! above a budget, a load factor widens future intervals to shed load, and
//! relaxes back toward 1.0 when durations recover.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::catalog::{DirectoryDescriptor, Tier};
use crate::config;

/// Rolling sample count for the duration trend.
const DURATION_SAMPLES: usize = 10;
/// Widening step applied when the mean duration exceeds the budget.
const WIDEN_STEP: f64 = 1.25;
/// Relaxation step applied when durations are back under budget.
const RELAX_STEP: f64 = 0.9;

/// One pending check. Ephemeral: exists only in the scheduler's heap until
/// executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTask {
    pub directory_id: String,
    pub tier: Tier,
    pub scheduled_at: Instant,
    pub estimated_duration: Duration,
}

impl Ord for CheckTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert the time comparison so the
        // earliest task surfaces first. Among tasks due at the same instant,
        // higher tiers go first.
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| self.tier.cmp(&other.tier))
    }
}

impl PartialOrd for CheckTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The base check interval for a tier.
pub fn interval_for(tier: Tier) -> Duration {
    match tier {
        Tier::High => config::CHECK_INTERVAL_HIGH,
        Tier::Medium => config::CHECK_INTERVAL_MEDIUM,
        Tier::Low => config::CHECK_INTERVAL_LOW,
    }
}

/// Pending-task heap plus the adaptive load factor.
pub struct CheckScheduler {
    heap: Mutex<BinaryHeap<CheckTask>>,
    durations: Mutex<VecDeque<Duration>>,
    load_factor: Mutex<f64>,
    duration_budget: Duration,
    max_load_factor: f64,
}

impl CheckScheduler {
    pub fn new() -> Self {
        CheckScheduler {
            heap: Mutex::new(BinaryHeap::new()),
            durations: Mutex::new(VecDeque::with_capacity(DURATION_SAMPLES)),
            load_factor: Mutex::new(1.0),
            duration_budget: config::HEALTH_DURATION_BUDGET,
            max_load_factor: config::HEALTH_MAX_LOAD_FACTOR,
        }
    }

    /// Schedules an immediate first check for every catalog entry.
    ///
    /// First checks are staggered by the dispatch interval so startup does
    /// not burst the whole catalog at once.
    pub async fn seed(&self, descriptors: &[Arc<DirectoryDescriptor>]) {
        let now = Instant::now();
        let mut heap = self.heap.lock().await;
        heap.clear();
        for (i, descriptor) in descriptors.iter().enumerate() {
            heap.push(CheckTask {
                directory_id: descriptor.id.clone(),
                tier: descriptor.tier,
                scheduled_at: now + config::HEALTH_DISPATCH_STAGGER * i as u32,
                estimated_duration: self.estimated_duration_locked().await,
            });
        }
    }

    /// Pops the next task if it is due.
    pub async fn pop_due(&self) -> Option<CheckTask> {
        let mut heap = self.heap.lock().await;
        if let Some(task) = heap.peek() {
            if task.scheduled_at <= Instant::now() {
                return heap.pop();
            }
        }
        None
    }

    /// When the next task becomes due, if any are pending.
    pub async fn next_wakeup(&self) -> Option<Instant> {
        self.heap.lock().await.peek().map(|t| t.scheduled_at)
    }

    /// Number of pending tasks.
    pub async fn pending(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Reschedules a directory's next check at `now + interval × load
    /// factor`.
    pub async fn reschedule(&self, directory_id: &str, tier: Tier) {
        let factor = *self.load_factor.lock().await;
        let interval = interval_for(tier).mul_f64(factor);
        let task = CheckTask {
            directory_id: directory_id.to_string(),
            tier,
            scheduled_at: Instant::now() + interval,
            estimated_duration: self.estimated_duration_locked().await,
        };
        self.heap.lock().await.push(task);
    }

    /// Records an observed check duration and adjusts the load factor.
    pub async fn record_duration(&self, duration: Duration) {
        let mean = {
            let mut durations = self.durations.lock().await;
            if durations.len() == DURATION_SAMPLES {
                durations.pop_front();
            }
            durations.push_back(duration);
            let total: Duration = durations.iter().sum();
            total / durations.len() as u32
        };

        let mut factor = self.load_factor.lock().await;
        if mean > self.duration_budget {
            let widened = (*factor * WIDEN_STEP).min(self.max_load_factor);
            if widened > *factor {
                log::info!(
                    "Health scheduler shedding load: mean check duration {:.1}s over budget {:.1}s, interval factor {:.2} -> {:.2}",
                    mean.as_secs_f64(),
                    self.duration_budget.as_secs_f64(),
                    *factor,
                    widened
                );
            }
            *factor = widened;
        } else {
            *factor = (*factor * RELAX_STEP).max(1.0);
        }
    }

    /// Current interval widening factor (1.0 = no widening).
    pub async fn load_factor(&self) -> f64 {
        *self.load_factor.lock().await
    }

    async fn estimated_duration_locked(&self) -> Duration {
        let durations = self.durations.lock().await;
        if durations.is_empty() {
            return Duration::from_secs(5);
        }
        let total: Duration = durations.iter().sum();
        total / durations.len() as u32
    }
}

impl Default for CheckScheduler {
    fn default() -> Self {
        Self::new()
    }
}
