//! Quiet region detection for quietcut
//!
//! Finds stretches of near-silence in an input and reports them as ranked
//! `QuietCandidate`s: longest first, earliest first among equals, capped to a
//! configured count.
//!
//! Detection is advisory. A failed volume pass, a failed or timed-out
//! silence pass, or missing markers all yield an empty list, never an error.
//!
//! # Example
//!
//! ```rust
//! use quietcut_silence::{parse_silence_markers, rank_candidates};
//!
//! let text = "silence_start: 1.234\nsilence_end: 2.567 | silence_duration: 1.333";
//! let candidates = rank_candidates(parse_silence_markers(text), 10);
//! assert_eq!(candidates[0].start_ms, 1_234);
//! assert_eq!(candidates[0].end_ms, 2_567);
//! ```

#![deny(unsafe_code)]

mod detector;
mod error;
mod markers;
mod settings;

pub use detector::{
    silence_args, volume_args, QuietDetection, QuietRegionDetector, SILENCE_PHASE, VOLUME_PHASE,
};
pub use error::DetectionError;
pub use markers::{parse_silence_markers, parse_volume_stats, rank_candidates, VolumeStats};
pub use settings::{DetectionMode, QuietDetectionSettings};
