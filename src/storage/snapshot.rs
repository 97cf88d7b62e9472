//! Queue snapshot payloads.

use serde::{Deserialize, Serialize};

use crate::catalog::{BusinessProfile, Tier};

/// One pending job, as persisted. The descriptor is stored by id and
/// re-resolved against the catalog on restore; a snapshot never embeds
/// catalog data that could go stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingJobRecord {
    pub job_id: String,
    pub seq: u64,
    pub directory_id: String,
    /// Effective queue priority, when it was overridden at enqueue time.
    #[serde(default)]
    pub priority: Option<Tier>,
    pub profile: BusinessProfile,
}

/// Aggregate counters at snapshot time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retried: usize,
}

/// A full queue snapshot: pending contents plus counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Wall-clock time the snapshot was taken, epoch milliseconds.
    pub taken_ms: i64,
    pub pending: Vec<PendingJobRecord>,
    pub counters: CounterSnapshot,
}
