//! Database schema management.

use sqlx::{Pool, Sqlite};

use crate::error_handling::StorageError;

/// Creates the schema if it does not exist yet.
///
/// Idempotent; run at startup before either engine touches the pool.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS queue_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            taken_ms INTEGER NOT NULL,
            payload TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS job_outcomes (
            job_id TEXT NOT NULL,
            directory_id TEXT NOT NULL,
            status TEXT NOT NULL,
            category TEXT,
            error TEXT,
            skip_reason TEXT,
            retry_count INTEGER NOT NULL,
            created_ms INTEGER NOT NULL,
            started_ms INTEGER,
            ended_ms INTEGER,
            elapsed_seconds REAL NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_job_outcomes_directory
         ON job_outcomes (directory_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
