//! Error handling and processing statistics.
//!
//! This module provides:
//! - The submission error taxonomy and supporting error types
//! - Error classification (typed downcasts first, string signatures second)
//! - Per-category statistics tracking
//!
//! Classification feeds the retry policy: network and timeout failures are
//! retried with backoff, structural failures get a small fixed budget, skip
//! conditions are terminal non-errors, and unknown errors get the most
//! conservative handling (no retry, flagged for review).

mod classify;
mod stats;
mod types;

// Re-export public API
pub use classify::{classify_error, default_classifier, ErrorClassifier};
pub use stats::EngineStats;
pub use types::{
    ErrorCategory, InitializationError, SkipReason, StorageError, SubmissionError,
};
