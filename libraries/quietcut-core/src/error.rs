/// Core error types for quietcut
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for quietcut
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A range whose end precedes its start
    #[error("Invalid time range: end {end_ms}ms is before start {start_ms}ms")]
    InvalidRange { start_ms: u64, end_ms: u64 },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
