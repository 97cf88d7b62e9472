//! Durable local storage.
//!
//! SQLite-backed persistence for the queue engine: periodic queue snapshots
//! (so an interrupted run resumes instead of losing progress) and the
//! append-only job outcome log consumed by reporting.

mod migrations;
mod outcomes;
mod pool;
mod snapshot;

pub use migrations::run_migrations;
pub use outcomes::{OutcomeSummaryRow, QueueStore};
pub use pool::init_db_pool_with_path;
pub use snapshot::{CounterSnapshot, PendingJobRecord, QueueSnapshot};
