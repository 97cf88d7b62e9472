// Queue persistence: snapshot on stop, resume on startup.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use dirsubmit::catalog::{BusinessProfile, Catalog};
use dirsubmit::queue::SubmissionQueue;
use dirsubmit::storage::{
    init_db_pool_with_path, run_migrations, CounterSnapshot, PendingJobRecord, QueueSnapshot,
    QueueStore,
};

use helpers::{catalog_file, fast_config, profile, MockSurface, RecordingSink};

async fn store_at(dir: &tempfile::TempDir) -> QueueStore {
    let pool = init_db_pool_with_path(&dir.path().join("queue.db"))
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");
    QueueStore::new(pool)
}

#[tokio::test]
async fn interrupted_run_resumes_from_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_json = catalog_file(&[("dir-a", "high"), ("dir-b", "low"), ("dir-c", "medium")]);
    let catalog = Catalog::load(catalog_json.path()).expect("catalog");

    // First process: enqueue the catalog but never let a job start, then
    // stop. Stop writes the final snapshot.
    {
        let queue = SubmissionQueue::new(
            fast_config(),
            Arc::new(MockSurface::new()),
            RecordingSink::new(),
            None,
            Some(store_at(&dir).await),
        );
        queue.enqueue_catalog(&catalog, profile()).await;
        queue.pause();
        queue.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        queue.stop().await;

        assert_eq!(queue.status().await.pending, 3);
    }

    // Second process: restore and drain.
    {
        let surface = Arc::new(MockSurface::new());
        let queue = SubmissionQueue::new(
            fast_config(),
            surface.clone(),
            RecordingSink::new(),
            None,
            Some(store_at(&dir).await),
        );
        let restored = queue
            .restore_from_snapshot(&catalog)
            .await
            .expect("restore");
        assert_eq!(restored, 3);
        assert_eq!(queue.status().await.pending, 3);

        queue.start().await;
        let status = queue.run_until_drained().await;
        queue.stop().await;
        assert_eq!(status.succeeded, 3);
        assert!(surface.sessions_balanced());
    }
}

#[tokio::test]
async fn restore_preserves_counters_and_priority_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_json = catalog_file(&[("dir-a", "low"), ("dir-b", "high")]);
    let catalog = Catalog::load(catalog_json.path()).expect("catalog");
    let store = store_at(&dir).await;

    // Hand-craft a snapshot from a partially completed run.
    store
        .write_snapshot(&QueueSnapshot {
            taken_ms: QueueStore::now_ms(),
            pending: vec![
                PendingJobRecord {
                    job_id: "job_7".into(),
                    seq: 7,
                    directory_id: "dir-a".into(),
                    priority: None,
                    profile: BusinessProfile::default(),
                },
                PendingJobRecord {
                    job_id: "job_8".into(),
                    seq: 8,
                    directory_id: "dir-b".into(),
                    priority: None,
                    profile: BusinessProfile::default(),
                },
            ],
            counters: CounterSnapshot {
                succeeded: 6,
                failed: 1,
                skipped: 2,
                retried: 3,
            },
        })
        .await
        .expect("write snapshot");

    let surface = Arc::new(MockSurface::new());
    let queue = SubmissionQueue::new(
        fast_config(),
        surface.clone(),
        RecordingSink::new(),
        None,
        Some(store),
    );
    let restored = queue.restore_from_snapshot(&catalog).await.expect("restore");
    assert_eq!(restored, 2);

    let status = queue.status().await;
    assert_eq!(status.succeeded, 6);
    assert_eq!(status.failed, 1);
    assert_eq!(status.skipped, 2);
    assert_eq!(status.retried, 3);

    queue.start().await;
    let status = queue.run_until_drained().await;
    queue.stop().await;

    // Both restored jobs completed on top of the restored counters, and the
    // high-tier job went first despite its higher sequence number.
    assert_eq!(status.succeeded, 8);
    let opened = surface.opened_urls.lock().unwrap().clone();
    assert_eq!(
        opened,
        vec![
            "https://dir-b.example.com/submit",
            "https://dir-a.example.com/submit",
        ]
    );
}

#[tokio::test]
async fn restore_drops_jobs_for_directories_gone_from_catalog() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_json = catalog_file(&[("dir-a", "high")]);
    let catalog = Catalog::load(catalog_json.path()).expect("catalog");
    let store = store_at(&dir).await;

    store
        .write_snapshot(&QueueSnapshot {
            taken_ms: QueueStore::now_ms(),
            pending: vec![
                PendingJobRecord {
                    job_id: "job_1".into(),
                    seq: 1,
                    directory_id: "dir-a".into(),
                    priority: None,
                    profile: BusinessProfile::default(),
                },
                PendingJobRecord {
                    job_id: "job_2".into(),
                    seq: 2,
                    directory_id: "dir-retired".into(),
                    priority: None,
                    profile: BusinessProfile::default(),
                },
            ],
            counters: CounterSnapshot::default(),
        })
        .await
        .expect("write snapshot");

    let queue = SubmissionQueue::new(
        fast_config(),
        Arc::new(MockSurface::new()),
        RecordingSink::new(),
        None,
        Some(store),
    );
    let restored = queue.restore_from_snapshot(&catalog).await.expect("restore");
    assert_eq!(restored, 1);
    assert_eq!(queue.status().await.pending, 1);
}

#[tokio::test]
async fn no_snapshot_restores_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_json = catalog_file(&[("dir-a", "high")]);
    let catalog = Catalog::load(catalog_json.path()).expect("catalog");

    let queue = SubmissionQueue::new(
        fast_config(),
        Arc::new(MockSurface::new()),
        RecordingSink::new(),
        None,
        Some(store_at(&dir).await),
    );
    let restored = queue.restore_from_snapshot(&catalog).await.expect("restore");
    assert_eq!(restored, 0);
    assert_eq!(queue.status().await.pending, 0);
}
