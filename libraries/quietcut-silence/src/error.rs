//! Error types for quiet region detection
//!
//! Detection is advisory: these errors are logged and turned into an empty
//! result by the detector rather than returned to callers.

use quietcut_jobs::ProcessError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DetectionError {
    #[error("Volume pass failed: {0}")]
    VolumePass(#[source] ProcessError),

    #[error("Volume pass reported no mean volume")]
    MissingVolume,

    #[error("Silence pass failed: {0}")]
    SilencePass(#[source] ProcessError),

    #[error("Invalid detection settings: {0}")]
    InvalidSettings(String),
}
