//! Error types for loudness analysis

use thiserror::Error;

/// Result type for loudness operations
pub type Result<T> = std::result::Result<T, LoudnessError>;

/// Errors that can occur while measuring or configuring loudness
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoudnessError {
    /// The diagnostic stream held no measurement block
    #[error("No loudness measurement found in analysis output")]
    MissingMeasurement,

    /// A measurement block was found but could not be read
    #[error("Invalid loudness measurement: {0}")]
    InvalidMeasurement(String),

    /// Normalization target settings are inconsistent
    #[error("Invalid normalization target: {0}")]
    InvalidTarget(String),
}
