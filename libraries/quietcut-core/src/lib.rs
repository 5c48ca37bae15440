//! Quietcut Core
//!
//! Identifiers and time-range value types shared by every quietcut crate.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Identity**: `JobId`, the key the job registry tracks processes by
//! - **Time ranges**: `TimeRange` (edit-list ranges fed to the media tool) and
//!   `QuietCandidate` (quiet regions reported by the detector)
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use quietcut_core::{JobId, QuietCandidate, TimeRange};
//!
//! let id = JobId::generate();
//! assert!(!id.as_str().is_empty());
//!
//! let range = TimeRange::new(1_500, 4_000).unwrap();
//! assert_eq!(range.seek_args(), vec!["-ss", "1.500", "-t", "2.500"]);
//!
//! let quiet = QuietCandidate::new(1_234, 2_567).unwrap();
//! assert_eq!(quiet.duration_ms(), 1_333);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod ids;
pub mod time;

pub use error::{CoreError, Result};
pub use ids::JobId;
pub use time::{format_seconds, ms_to_seconds, seconds_to_ms, QuietCandidate, TimeRange};
