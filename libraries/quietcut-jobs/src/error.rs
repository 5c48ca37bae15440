//! Error types for supervised processes

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Closed set of ways a supervised job can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessErrorKind {
    /// Binary missing or not executable
    SpawnFailed,
    /// Wall-clock budget exceeded
    Timeout,
    /// Stopped by the caller
    Cancelled,
    /// The tool ran and reported failure
    NonZeroExit,
}

impl ProcessErrorKind {
    /// Whether a different invocation of the tool might succeed
    ///
    /// Only a tool-reported failure qualifies; a missing binary, a timeout or
    /// a cancellation would fail the same way for every strategy.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NonZeroExit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpawnFailed => "SPAWN_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::NonZeroExit => "NON_ZERO_EXIT",
        }
    }
}

impl fmt::Display for ProcessErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one job
///
/// `diagnostic_text` holds only the last lines of the tool's diagnostic
/// stream, never the whole stream.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind}: {message}")]
pub struct ProcessError {
    pub kind: ProcessErrorKind,
    pub message: String,
    pub diagnostic_text: String,
    pub exit_code: Option<i32>,
}

impl ProcessError {
    pub fn new(kind: ProcessErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostic_text: String::new(),
            exit_code: None,
        }
    }

    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::new(ProcessErrorKind::SpawnFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProcessErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ProcessErrorKind::Cancelled, message)
    }

    pub fn non_zero_exit(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            exit_code,
            ..Self::new(ProcessErrorKind::NonZeroExit, message)
        }
    }

    /// Attach the diagnostic excerpt
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostic_text: impl Into<String>) -> Self {
        self.diagnostic_text = diagnostic_text.into();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
