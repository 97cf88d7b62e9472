//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, retry budgets, thresholds)
//! - The library `Config` struct and logging option types

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, LogFormat, LogLevel, DEFAULT_USER_AGENT};
