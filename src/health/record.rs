//! Health records and the single-writer record table.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::alerts::Alert;
use crate::catalog::DirectoryDescriptor;
use crate::config::{ALERT_HISTORY_CAP, HEALTH_WINDOW_SIZE};

/// Reachability classification for a directory's submission page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Not checked yet.
    Unknown,
    /// Page reachable and answering normally (2xx/3xx).
    Accessible,
    /// Page answering but impaired (4xx).
    Degraded,
    /// Timeout, connection failure, or server error (5xx).
    Inaccessible,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Accessible => "accessible",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Inaccessible => "inaccessible",
        }
    }
}

/// Inferred likelihood that a page is actively defending against automation.
///
/// Ordered so `>` comparisons read naturally: `High > Medium > Low > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Parsed shape of a page's submission form(s), used for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStructure {
    /// Number of `<form>` elements on the page.
    pub form_count: usize,
    /// Form methods, in document order, lowercased.
    pub methods: Vec<String>,
    /// Form actions, in document order.
    pub actions: Vec<String>,
    /// Names/ids of input-like elements, sorted.
    pub field_names: Vec<String>,
    /// Presence of each mapped selector at parse time.
    pub mapped_present: BTreeMap<String, bool>,
}

impl FormStructure {
    /// Stable fingerprint of the structure. Two pages with identical parsed
    /// shape produce identical fingerprints across runs.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.form_count.hash(&mut hasher);
        self.methods.hash(&mut hasher);
        self.actions.hash(&mut hasher);
        self.field_names.hash(&mut hasher);
        self.mapped_present.hash(&mut hasher);
        hasher.finish()
    }
}

/// The latest known health state for one directory.
///
/// Owned exclusively by the health monitor (single writer); everyone else
/// sees clones through [`HealthView`].
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub directory_id: String,
    pub status: HealthStatus,
    /// Latency of the last accessibility fetch.
    pub last_latency: Option<Duration>,
    /// Rolling window of check outcomes (true = check succeeded).
    outcomes: VecDeque<bool>,
    /// Validity of each mapped selector. Keys are always exactly the
    /// descriptor's field-mapping keys.
    pub selector_validity: BTreeMap<String, bool>,
    pub risk_level: RiskLevel,
    /// Cached structure baseline for edge-triggered change detection.
    pub structure: Option<FormStructure>,
    pub structure_hash: Option<u64>,
    /// Bounded history of alerts raised for this directory.
    alert_history: VecDeque<Alert>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// Creates the initial (unchecked) record for a directory.
    ///
    /// The selector-validity map is seeded with every field-mapping key so
    /// its key set matches the descriptor from the first moment.
    pub fn new(descriptor: &DirectoryDescriptor) -> Self {
        let selector_validity = descriptor
            .field_mapping
            .keys()
            .map(|k| (k.clone(), true))
            .collect();
        HealthRecord {
            directory_id: descriptor.id.clone(),
            status: HealthStatus::Unknown,
            last_latency: None,
            outcomes: VecDeque::with_capacity(HEALTH_WINDOW_SIZE),
            selector_validity,
            risk_level: RiskLevel::None,
            structure: None,
            structure_hash: None,
            alert_history: VecDeque::with_capacity(ALERT_HISTORY_CAP),
            last_checked: None,
        }
    }

    /// Records one check outcome into the rolling window.
    pub fn record_outcome(&mut self, success: bool) {
        if self.outcomes.len() == HEALTH_WINDOW_SIZE {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    /// Rolling success rate, or `None` before any outcome is recorded.
    pub fn success_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let successes = self.outcomes.iter().filter(|s| **s).count();
        Some(successes as f64 / self.outcomes.len() as f64)
    }

    /// Fraction of mapped selectors that currently resolve. Directories with
    /// an empty mapping count as fully valid.
    pub fn validity_ratio(&self) -> f64 {
        if self.selector_validity.is_empty() {
            return 1.0;
        }
        let valid = self.selector_validity.values().filter(|v| **v).count();
        valid as f64 / self.selector_validity.len() as f64
    }

    /// Appends an alert to the bounded history ring.
    pub fn push_alert(&mut self, alert: Alert) {
        if self.alert_history.len() == ALERT_HISTORY_CAP {
            self.alert_history.pop_front();
        }
        self.alert_history.push_back(alert);
    }

    /// Recent alerts, oldest first.
    pub fn alert_history(&self) -> impl Iterator<Item = &Alert> {
        self.alert_history.iter()
    }
}

/// Owner handle for the health-record table. Only the health monitor holds
/// one, which is what makes the single-writer discipline structural rather
/// than conventional.
#[derive(Debug)]
pub struct HealthTable {
    inner: Arc<RwLock<HashMap<String, HealthRecord>>>,
}

impl HealthTable {
    /// Creates a table seeded with an initial record per catalog entry.
    pub fn new(descriptors: &[Arc<DirectoryDescriptor>]) -> Self {
        let records = descriptors
            .iter()
            .map(|d| (d.id.clone(), HealthRecord::new(d)))
            .collect();
        HealthTable {
            inner: Arc::new(RwLock::new(records)),
        }
    }

    /// Returns a read-only view for consumers (the queue engine's
    /// pre-flight check).
    pub fn view(&self) -> HealthView {
        HealthView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Replaces a directory's record wholesale (atomic replace-on-write).
    pub async fn replace(&self, record: HealthRecord) {
        self.inner
            .write()
            .await
            .insert(record.directory_id.clone(), record);
    }

    /// Clones a directory's current record.
    pub async fn get(&self, directory_id: &str) -> Option<HealthRecord> {
        self.inner.read().await.get(directory_id).cloned()
    }

    /// Clones every record.
    pub async fn all(&self) -> Vec<HealthRecord> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Drops all records and reseeds from a fresh catalog. Used only on
    /// explicit catalog reload.
    pub async fn reset(&self, descriptors: &[Arc<DirectoryDescriptor>]) {
        let mut table = self.inner.write().await;
        table.clear();
        for d in descriptors {
            table.insert(d.id.clone(), HealthRecord::new(d));
        }
    }
}

/// Read-only view over the health-record table.
#[derive(Debug, Clone)]
pub struct HealthView {
    inner: Arc<RwLock<HashMap<String, HealthRecord>>>,
}

impl HealthView {
    /// Clones a directory's current record, if one exists.
    pub async fn get(&self, directory_id: &str) -> Option<HealthRecord> {
        self.inner.read().await.get(directory_id).cloned()
    }
}
