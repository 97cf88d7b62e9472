// Health monitoring engine tests against local HTTP fixtures.

mod helpers;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::{routing::get, Router};
use tokio::net::TcpListener;

use dirsubmit::alerts::{AlertReason, Severity};
use dirsubmit::catalog::{Catalog, Tier};
use dirsubmit::config::Config;
use dirsubmit::health::{HealthMonitor, HealthStatus, RiskLevel};
use dirsubmit::queue::SubmissionQueue;

use helpers::{fast_config, profile, MockSurface, RecordingSink};

const FULL_FORM: &str = r#"
    <html><body>
    <form method="post" action="/submit">
        <input id="biz-name" name="company">
        <input id="biz-phone" name="phone">
    </form>
    </body></html>
"#;

const FORM_WITHOUT_PHONE: &str = r#"
    <html><body>
    <form method="post" action="/submit">
        <input id="biz-name" name="company">
    </form>
    </body></html>
"#;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });
    format!("http://{}/submit", addr)
}

/// Writes a single-entry catalog pointing at a live fixture URL.
fn catalog_for(id: &str, tier: Tier, url: &str) -> tempfile::NamedTempFile {
    let json = serde_json::json!({
        "version": "test",
        "directories": [{
            "id": id,
            "name": id,
            "submission_url": url,
            "category": "general",
            "tier": tier.as_str(),
            "field_mapping": {"business_name": "#biz-name", "phone": "#biz-phone"},
            "difficulty": "easy",
            "domain_authority": 50
        }]
    });
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(json.to_string().as_bytes()).expect("write");
    f
}

#[tokio::test]
async fn stable_directory_produces_no_change_alerts() {
    let url = serve(Router::new().route("/submit", get(|| async { Html(FULL_FORM) }))).await;
    let catalog_file = catalog_for("dir-stable", Tier::High, &url);
    let catalog = Catalog::load(catalog_file.path()).expect("catalog");

    let sink = RecordingSink::new();
    let monitor =
        HealthMonitor::new(&Config::default(), &catalog, sink.clone()).expect("monitor");

    let record = monitor.force_check("dir-stable").await.expect("check");
    assert_eq!(record.status, HealthStatus::Accessible);
    assert_eq!(record.validity_ratio(), 1.0);
    assert_eq!(record.risk_level, RiskLevel::None);
    assert!(record.structure_hash.is_some());

    // Second check with an unchanged structure hash: zero change alerts.
    monitor.force_check("dir-stable").await.expect("check");
    assert_eq!(sink.count_by_reason(AlertReason::FormStructureChanged), 0);
    assert_eq!(sink.alerts.lock().unwrap().len(), 0);

    let status = monitor.monitoring_status().await;
    assert_eq!(status.directories, 1);
    assert_eq!(status.healthy, 1);
    assert_eq!(status.checks_performed, 2);
    assert_eq!(status.alerts_raised, 0);
}

#[tokio::test]
async fn dropped_field_alerts_once_then_rebaselines() {
    let dropped = Arc::new(AtomicBool::new(false));
    let dropped_for_handler = Arc::clone(&dropped);
    let app = Router::new().route(
        "/submit",
        get(move || {
            let dropped = Arc::clone(&dropped_for_handler);
            async move {
                if dropped.load(Ordering::SeqCst) {
                    Html(FORM_WITHOUT_PHONE)
                } else {
                    Html(FULL_FORM)
                }
            }
        }),
    );
    let url = serve(app).await;
    let catalog_file = catalog_for("dir-drift", Tier::High, &url);
    let catalog = Catalog::load(catalog_file.path()).expect("catalog");

    let sink = RecordingSink::new();
    let monitor =
        HealthMonitor::new(&Config::default(), &catalog, sink.clone()).expect("monitor");

    // Baseline.
    let record = monitor.force_check("dir-drift").await.expect("check");
    assert_eq!(record.validity_ratio(), 1.0);

    // The form drops a previously-mapped field.
    dropped.store(true, Ordering::SeqCst);
    let record = monitor.force_check("dir-drift").await.expect("check");
    assert_eq!(record.selector_validity.get("phone"), Some(&false));
    assert!(record.validity_ratio() < 1.0);
    assert_eq!(sink.count_by_reason(AlertReason::FormStructureChanged), 1);
    assert_eq!(
        sink.count_by_reason(AlertReason::SelectorValidityDegraded),
        1
    );

    // The directory stabilizes in its new shape: the change was re-baselined
    // and the validity alert sits in its cooldown window, so a third check
    // emits nothing new.
    monitor.force_check("dir-drift").await.expect("check");
    assert_eq!(sink.count_by_reason(AlertReason::FormStructureChanged), 1);
    assert_eq!(
        sink.count_by_reason(AlertReason::SelectorValidityDegraded),
        1
    );

    // The record's bounded alert history kept what was raised.
    let record = monitor.health_summary("dir-drift").await.expect("record");
    assert!(record.alert_history().count() >= 2);
}

#[tokio::test]
async fn http_500_marks_inaccessible_and_queue_preflight_skips() {
    let app = Router::new().route(
        "/submit",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
    );
    let url = serve(app).await;
    let catalog_file = catalog_for("dir-broken", Tier::High, &url);
    let catalog = Catalog::load(catalog_file.path()).expect("catalog");

    let sink = RecordingSink::new();
    let monitor =
        HealthMonitor::new(&Config::default(), &catalog, sink.clone()).expect("monitor");

    let record = monitor.force_check("dir-broken").await.expect("check");
    assert_eq!(record.status, HealthStatus::Inaccessible);
    assert_eq!(sink.count_by_reason(AlertReason::DirectoryInaccessible), 1);
    assert!(sink
        .alerts
        .lock()
        .unwrap()
        .iter()
        .any(|a| a.reason == AlertReason::DirectoryInaccessible
            && a.severity == Severity::Critical));

    // The queue consults the record and skips without opening a session.
    let surface = Arc::new(MockSurface::new());
    let queue = SubmissionQueue::new(
        fast_config(),
        surface.clone(),
        RecordingSink::new(),
        Some(monitor.view()),
        None,
    );
    let descriptor = Arc::clone(catalog.get("dir-broken").expect("descriptor"));
    queue.enqueue(descriptor, profile(), None).await;

    queue.start().await;
    let status = queue.run_until_drained().await;
    queue.stop().await;

    assert_eq!(status.skipped, 1);
    assert_eq!(surface.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn challenge_page_forces_high_risk() {
    let app = Router::new().route(
        "/submit",
        get(|| async {
            Html("<html><body>Checking your browser before accessing the site.</body></html>")
        }),
    );
    let url = serve(app).await;
    let catalog_file = catalog_for("dir-shielded", Tier::High, &url);
    let catalog = Catalog::load(catalog_file.path()).expect("catalog");

    let sink = RecordingSink::new();
    let monitor =
        HealthMonitor::new(&Config::default(), &catalog, sink.clone()).expect("monitor");

    let record = monitor.force_check("dir-shielded").await.expect("check");
    assert_eq!(record.risk_level, RiskLevel::High);
    assert!(sink
        .alerts
        .lock()
        .unwrap()
        .iter()
        .any(|a| a.reason == AlertReason::AntiAutomationRisk
            && a.severity == Severity::Critical));
}

#[tokio::test]
async fn rate_limit_headers_alone_yield_medium_risk() {
    let app = Router::new().route(
        "/submit",
        get(|| async {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", "120".parse().unwrap());
            (headers, Html(FULL_FORM)).into_response()
        }),
    );
    let url = serve(app).await;
    let catalog_file = catalog_for("dir-throttled", Tier::Medium, &url);
    let catalog = Catalog::load(catalog_file.path()).expect("catalog");

    let sink = RecordingSink::new();
    let monitor =
        HealthMonitor::new(&Config::default(), &catalog, sink.clone()).expect("monitor");

    let record = monitor.force_check("dir-throttled").await.expect("check");
    assert_eq!(record.risk_level, RiskLevel::Medium);
    assert!(sink
        .alerts
        .lock()
        .unwrap()
        .iter()
        .any(|a| a.reason == AlertReason::AntiAutomationRisk
            && a.severity == Severity::Warning));
}
