/// Engine error types
use quietcut_core::CoreError;
use quietcut_jobs::{ProcessError, RenderError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Invalid range: {0}")]
    Range(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
