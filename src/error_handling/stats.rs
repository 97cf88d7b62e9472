//! Per-category error statistics.
//!
//! Thread-safe counters for failure categories, shared between the engines
//! and printed at the end of a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;
use strum::IntoEnumIterator;

use super::types::ErrorCategory;

/// Thread-safe per-category error counters.
///
/// All categories are initialized to zero on creation; the struct is meant
/// to be shared across tasks behind an `Arc`.
pub struct EngineStats {
    counters: HashMap<ErrorCategory, AtomicUsize>,
}

impl EngineStats {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for category in ErrorCategory::iter() {
            counters.insert(category, AtomicUsize::new(0));
        }
        EngineStats { counters }
    }

    /// Increments the counter for a category.
    pub fn increment(&self, category: ErrorCategory) {
        if let Some(counter) = self.counters.get(&category) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "No counter for category {:?}; EngineStats was not fully initialized",
                category
            );
        }
    }

    /// Returns the count for a category.
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.counters
            .get(&category)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total count across all categories.
    pub fn total(&self) -> usize {
        self.counters
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    /// Prints the nonzero counters to the log.
    pub fn log_summary(&self) {
        let total = self.total();
        if total == 0 {
            return;
        }
        info!("Error counts ({} total):", total);
        for category in ErrorCategory::iter() {
            let count = self.count(category);
            if count > 0 {
                info!("   {}: {}", category.as_str(), count);
            }
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_start_at_zero() {
        let stats = EngineStats::new();
        for category in ErrorCategory::iter() {
            assert_eq!(stats.count(category), 0);
        }
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_increment_and_total() {
        let stats = EngineStats::new();
        stats.increment(ErrorCategory::Network);
        stats.increment(ErrorCategory::Network);
        stats.increment(ErrorCategory::Unknown);
        assert_eq!(stats.count(ErrorCategory::Network), 2);
        assert_eq!(stats.count(ErrorCategory::Unknown), 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_log_summary_does_not_panic() {
        let stats = EngineStats::new();
        stats.log_summary();
        stats.increment(ErrorCategory::Timeout);
        stats.log_summary();
    }
}
