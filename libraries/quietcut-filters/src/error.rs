//! Error types for stage descriptors

use thiserror::Error;

/// Errors raised while building stage descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Compressor mode string not recognised
    #[error("Unknown compressor mode: {0} (expected level, limit or comp)")]
    UnknownCompressorMode(String),
}
