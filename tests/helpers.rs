// Shared test helpers: a scripted browser surface, catalog builders, and a
// capturing alert sink.
//
// Each integration test file pulls this in with `mod helpers;`, so any one
// file uses only a subset of it.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use dirsubmit::alerts::{Alert, AlertSink};
use dirsubmit::browser::{BrowserSurface, FillOutcome, SessionHandle, SkipProbe};
use dirsubmit::catalog::{
    BusinessProfile, Difficulty, DirectoryDescriptor, RequirementFlags, Tier,
};
use dirsubmit::config::Config;
use dirsubmit::error_handling::{SkipReason, SubmissionError};

/// Scripted behavior for one directory's submission page.
#[derive(Debug, Clone)]
#[allow(dead_code)] // Not every test file uses every variant
pub enum MockBehavior {
    /// Page loads and every field fills.
    Complete,
    /// A skip indicator matches after load.
    SkipAtProbe(SkipReason),
    /// The first N loads fail with a network error, then the page behaves.
    NetworkErrorTimes(usize),
    /// Field filling always reports a missing element.
    FillMissingElement,
    /// The page never finishes loading.
    Hang,
}

/// A browser surface driven by scripted behaviors, keyed by submission URL.
///
/// Counts opens and closes so tests can assert the close-exactly-once
/// guarantee, including under force-close.
pub struct MockSurface {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    remaining_failures: Mutex<HashMap<String, usize>>,
    open_sessions: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub double_closes: AtomicUsize,
    /// Submission URLs in the order sessions were opened.
    pub opened_urls: std::sync::Mutex<Vec<String>>,
}

impl MockSurface {
    pub fn new() -> Self {
        MockSurface {
            behaviors: Mutex::new(HashMap::new()),
            remaining_failures: Mutex::new(HashMap::new()),
            open_sessions: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            double_closes: AtomicUsize::new(0),
            opened_urls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn script(&self, url: &str, behavior: MockBehavior) {
        if let MockBehavior::NetworkErrorTimes(n) = &behavior {
            self.remaining_failures
                .lock()
                .await
                .insert(url.to_string(), *n);
        }
        self.behaviors
            .lock()
            .await
            .insert(url.to_string(), behavior);
    }

    async fn behavior_for(&self, url: &str) -> MockBehavior {
        self.behaviors
            .lock()
            .await
            .get(url)
            .cloned()
            .unwrap_or(MockBehavior::Complete)
    }

    /// True when every opened session has been closed exactly once.
    pub fn sessions_balanced(&self) -> bool {
        self.opens.load(Ordering::SeqCst) == self.closes.load(Ordering::SeqCst)
            && self.double_closes.load(Ordering::SeqCst) == 0
    }
}

#[async_trait]
impl BrowserSurface for MockSurface {
    async fn open_session(&self, url: &str) -> Result<SessionHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened_urls.lock().unwrap().push(url.to_string());
        self.open_sessions.lock().await.insert(id);
        Ok(SessionHandle {
            id,
            url: url.to_string(),
        })
    }

    async fn wait_for_load(&self, session: &SessionHandle, _timeout: Duration) -> Result<()> {
        match self.behavior_for(&session.url).await {
            MockBehavior::NetworkErrorTimes(_) => {
                let mut remaining = self.remaining_failures.lock().await;
                let left = remaining.entry(session.url.clone()).or_insert(0);
                if *left > 0 {
                    *left -= 1;
                    return Err(SubmissionError::Network("connection reset".into()).into());
                }
                Ok(())
            }
            MockBehavior::Hang => {
                // Never resolves; the watchdog has to kill this attempt.
                futures::future::pending::<()>().await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn evaluate_skip_indicators(&self, session: &SessionHandle) -> Result<SkipProbe> {
        match self.behavior_for(&session.url).await {
            MockBehavior::SkipAtProbe(reason) => Ok(SkipProbe::matched(reason)),
            _ => Ok(SkipProbe::clear()),
        }
    }

    async fn fill_fields(
        &self,
        session: &SessionHandle,
        mapping: &BTreeMap<String, String>,
        _profile: &BusinessProfile,
    ) -> Result<FillOutcome> {
        match self.behavior_for(&session.url).await {
            MockBehavior::FillMissingElement => Ok(FillOutcome {
                success: false,
                fields_filled: 0,
                error: Some("element not found for: business_name".into()),
            }),
            _ => Ok(FillOutcome {
                success: true,
                fields_filled: mapping.len(),
                error: None,
            }),
        }
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<()> {
        if self.open_sessions.lock().await.remove(&session.id) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.double_closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Alert sink that records everything it receives.
pub struct RecordingSink {
    pub alerts: std::sync::Mutex<Vec<Alert>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingSink {
            alerts: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn count_by_reason(&self, reason: dirsubmit::alerts::AlertReason) -> usize {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.reason == reason)
            .count()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Builds a descriptor whose submission URL embeds its id, so mock scripting
/// can address it.
#[allow(dead_code)]
pub fn descriptor(id: &str, tier: Tier) -> Arc<DirectoryDescriptor> {
    descriptor_with_url(id, tier, &format!("https://{id}.example.com/submit"))
}

#[allow(dead_code)]
pub fn descriptor_with_url(id: &str, tier: Tier, url: &str) -> Arc<DirectoryDescriptor> {
    Arc::new(DirectoryDescriptor {
        id: id.into(),
        name: id.into(),
        submission_url: url.into(),
        category: "general".into(),
        tier,
        field_mapping: [
            ("business_name".to_string(), "#biz-name".to_string()),
            ("phone".to_string(), "#biz-phone".to_string()),
        ]
        .into_iter()
        .collect(),
        flags: RequirementFlags::default(),
        difficulty: Difficulty::Easy,
        domain_authority: 50,
    })
}

#[allow(dead_code)]
pub fn profile() -> Arc<BusinessProfile> {
    Arc::new(BusinessProfile {
        business_name: "Acme Plumbing".into(),
        phone: "555-0100".into(),
        email: "info@acme.example".into(),
        ..Default::default()
    })
}

/// Config tuned for tests: no human pacing, fast watchdog, short timeouts.
#[allow(dead_code)]
pub fn fast_config() -> Config {
    Config {
        concurrency_slots: 1,
        inter_job_base_delay: Duration::from_millis(1),
        inter_job_jitter: Duration::from_millis(1),
        job_processing_timeout: Duration::from_secs(30),
        watchdog_interval: Duration::from_millis(25),
        page_load_timeout: Duration::from_millis(500),
        field_fill_timeout: Duration::from_millis(500),
        snapshot_interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

/// Writes a catalog JSON file covering the given (id, tier) pairs.
#[allow(dead_code)]
pub fn catalog_file(entries: &[(&str, &str)]) -> tempfile::NamedTempFile {
    let directories: Vec<String> = entries
        .iter()
        .map(|(id, tier)| {
            format!(
                r##"{{
                    "id": "{id}",
                    "name": "{id}",
                    "submission_url": "https://{id}.example.com/submit",
                    "category": "general",
                    "tier": "{tier}",
                    "field_mapping": {{"business_name": "#biz-name", "phone": "#biz-phone"}},
                    "difficulty": "easy",
                    "domain_authority": 50
                }}"##
            )
        })
        .collect();
    let json = format!(
        r#"{{"version": "test", "directories": [{}]}}"#,
        directories.join(",")
    );
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(json.as_bytes()).expect("write catalog");
    f
}
