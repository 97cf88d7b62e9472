//! Error type definitions.
//!
//! This module defines the submission error taxonomy and the supporting
//! error types used throughout the application.

use std::fmt;
use std::time::Duration;

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    /// Error launching or attaching to the browser automation surface.
    #[error("Browser surface initialization error: {0}")]
    BrowserSurfaceError(String),
}

/// Error types for durable storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Snapshot payload could not be serialized or deserialized.
    #[error("Snapshot encoding error: {0}")]
    SnapshotEncodingError(#[from] serde_json::Error),
}

/// Why a job was deliberately skipped instead of attempted or failed.
///
/// A skip is a terminal, non-error outcome. It is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The submission page sits behind a login wall.
    LoginRequired,
    /// The submission page sits behind a paywall.
    Paywall,
    /// A CAPTCHA gates the form.
    CaptchaPresent,
    /// Pre-flight: the directory's latest health record says it is
    /// unreachable.
    DirectoryInaccessible,
    /// Pre-flight: the directory's selector-validity ratio is below the
    /// configured floor.
    LowSelectorValidity,
}

impl SkipReason {
    /// Returns a human-readable description of the skip reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::LoginRequired => "login required",
            SkipReason::Paywall => "paywall detected",
            SkipReason::CaptchaPresent => "captcha present",
            SkipReason::DirectoryInaccessible => "directory inaccessible",
            SkipReason::LowSelectorValidity => "selector validity below floor",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The submission error taxonomy.
///
/// Every failure surfaced by a job attempt is one of these. `Skip` is not a
/// failure: it records a deliberate no-op decision.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Network-level failure (connect, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// An operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The page presented an anti-automation challenge mid-flight.
    #[error("anti-automation challenge: {0}")]
    AntiAutomation(String),

    /// A mapped form element could not be located on the page.
    #[error("form element not found: {0}")]
    FormElementNotFound(String),

    /// Deliberate skip; terminal, never retried.
    #[error("skipped: {0}")]
    Skip(SkipReason),

    /// Anything the classifier could not place.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SubmissionError {
    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SubmissionError::Network(_) => ErrorCategory::Network,
            SubmissionError::Timeout(_) => ErrorCategory::Timeout,
            SubmissionError::AntiAutomation(_) => ErrorCategory::AntiAutomation,
            SubmissionError::FormElementNotFound(_) => ErrorCategory::FormElementNotFound,
            SubmissionError::Skip(_) => ErrorCategory::Skip,
            SubmissionError::Unknown(_) => ErrorCategory::Unknown,
        }
    }
}

/// Flat error categories used for retry policy, counters, and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorCategory {
    Network,
    Timeout,
    AntiAutomation,
    FormElementNotFound,
    Skip,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::AntiAutomation => "anti-automation challenge",
            ErrorCategory::FormElementNotFound => "form element not found",
            ErrorCategory::Skip => "skip condition",
            ErrorCategory::Unknown => "unknown error",
        }
    }

    /// Whether failures in this category are worth retrying at all.
    ///
    /// Network and timeout failures are transient. Anti-automation and
    /// missing-element failures get a small budget since they usually need a
    /// structural fix. Skips are terminal by definition; unknown errors get
    /// the most conservative handling.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::AntiAutomation
                | ErrorCategory::FormElementNotFound
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
