//! Queue persistence: snapshots and the job outcome archive.

use std::sync::Arc;

use chrono::Utc;
use log::debug;
use sqlx::{Pool, Row, Sqlite};

use crate::error_handling::StorageError;
use crate::queue::JobOutcome;

use super::snapshot::QueueSnapshot;

/// Handle over the queue's durable state.
#[derive(Clone)]
pub struct QueueStore {
    pool: Arc<Pool<Sqlite>>,
}

/// One row of the outcome summary used by reporting.
#[derive(Debug, Clone)]
pub struct OutcomeSummaryRow {
    pub status: String,
    pub count: i64,
}

impl QueueStore {
    pub fn new(pool: Arc<Pool<Sqlite>>) -> Self {
        QueueStore { pool }
    }

    /// Writes a queue snapshot. Only the latest snapshot matters for
    /// resume, but history is kept for post-mortems; the table is pruned to
    /// the most recent few entries on every write.
    pub async fn write_snapshot(&self, snapshot: &QueueSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query("INSERT INTO queue_snapshots (taken_ms, payload) VALUES (?, ?)")
            .bind(snapshot.taken_ms)
            .bind(&payload)
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            "DELETE FROM queue_snapshots WHERE id NOT IN (
                SELECT id FROM queue_snapshots ORDER BY id DESC LIMIT 10
            )",
        )
        .execute(self.pool.as_ref())
        .await?;

        debug!(
            "Queue snapshot written: {} pending jobs",
            snapshot.pending.len()
        );
        Ok(())
    }

    /// Loads the most recent snapshot, if any.
    pub async fn load_latest_snapshot(&self) -> Result<Option<QueueSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM queue_snapshots ORDER BY id DESC LIMIT 1")
            .fetch_optional(self.pool.as_ref())
            .await?;
        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    /// Archives one terminal job outcome.
    pub async fn record_outcome(&self, outcome: &JobOutcome) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO job_outcomes (
                job_id, directory_id, status, category, error, skip_reason,
                retry_count, created_ms, started_ms, ended_ms, elapsed_seconds
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&outcome.job_id)
        .bind(&outcome.directory_id)
        .bind(outcome.status.as_str())
        .bind(outcome.category.map(|c| c.as_str()))
        .bind(&outcome.error)
        .bind(&outcome.skip_reason)
        .bind(outcome.retry_count as i64)
        .bind(outcome.created_at.timestamp_millis())
        .bind(outcome.started_at.map(|t| t.timestamp_millis()))
        .bind(outcome.ended_at.map(|t| t.timestamp_millis()))
        .bind(outcome.elapsed_seconds)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Per-status outcome counts, for the report command.
    pub async fn outcome_summary(&self) -> Result<Vec<OutcomeSummaryRow>, StorageError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) as count FROM job_outcomes GROUP BY status ORDER BY count DESC",
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| OutcomeSummaryRow {
                status: row.get("status"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Helper for snapshots: current epoch milliseconds.
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}
