//! Quietcut Engine
//!
//! Orchestrates an external media tool: filter-graph compilation, supervised
//! jobs with progress, escalating render strategies, two-pass loudness
//! normalization and quiet region detection.
//!
//! This library exposes the engine facade and configuration used by the
//! `quietcut` binary, and for testing purposes.

pub mod config;
pub mod engine;
pub mod error;
pub mod render;

// Re-export commonly used types for convenience
pub use config::QuietcutConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use render::standard_attempts;
