//! Supervised media-tool processes for quietcut
//!
//! Every invocation of the external media tool goes through a [`JobRegistry`].
//! The registry spawns the process, reads its diagnostic stream, publishes
//! progress, enforces the timeout and guarantees that each job resolves and
//! cleans up exactly once.
//!
//! # Architecture
//!
//! ```text
//! RunRequest ─► JobRegistry::run ─► spawn ─► supervisor ─┬─► stderr ─► DiagnosticLog ─► ProgressEvent
//!                                                        ├─► timeout timer
//!                                                        └─► cancel / cleanup
//!                                                                 │
//!                                            exactly one terminal resolution
//! ```
//!
//! Higher layers depend on the [`JobRunner`] trait rather than the registry
//! directly, so the render orchestrator and analysis passes can be exercised
//! against scripted runners.
//!
//! # Example
//!
//! ```rust,no_run
//! use quietcut_jobs::{JobRegistry, RegistryConfig, RunRequest};
//! use std::time::Duration;
//!
//! # async fn demo() -> quietcut_jobs::Result<()> {
//! let registry = JobRegistry::new(RegistryConfig::default());
//! let mut events = registry.subscribe();
//!
//! let output = registry
//!     .run(
//!         RunRequest::new(["-i", "talk.wav", "-f", "null", "-"])
//!             .expected_duration(Duration::from_secs(90)),
//!     )
//!     .await?;
//! assert!(output.success);
//!
//! while let Ok(event) = events.try_recv() {
//!     println!("{:?} {:?}", event.status, event.percent);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod config;
mod diagnostics;
mod error;
mod probe;
mod progress;
mod registry;
mod request;
mod runner;
mod strategy;

pub use config::{RegistryConfig, DEFAULT_PROGRESS_INTERVAL, DEFAULT_TIMEOUT};
pub use diagnostics::{
    parse_progress_position, parse_timestamp, truncate_tail, DiagnosticLog, LineSplitter,
};
pub use error::{ProcessError, ProcessErrorKind, Result};
pub use probe::probe_duration;
pub use progress::{percent_complete, JobStatus, ProgressEvent, ProgressThrottle};
pub use registry::{CancelOutcome, JobRegistry, JobSnapshot};
pub use request::{RunOutput, RunRequest, Tool, PREVIEW_PHASE};
pub use runner::JobRunner;
pub use strategy::{
    diagnose_failure, should_escalate, try_strategies, AttemptFailure, RenderAttempt,
    RenderContext, RenderError, RenderStrategy, RenderSuccess,
};
