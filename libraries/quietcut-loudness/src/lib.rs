//! Two-pass loudness normalization for quietcut
//!
//! This crate provides:
//! - The measurement pass: EBU R128 integrated loudness, true peak, loudness
//!   range and gating threshold, read from the media tool's diagnostic output
//! - The gain decision: peak-safe, clamped gain toward a target loudness
//! - Chain building for the render pass (`volume=<gain>dB` appended)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐
//! │ Input file  │ ──► │  analyze()   │ ──► │ LoudnessAnalysis  │
//! └─────────────┘     └──────────────┘     └───────────────────┘
//!                                                   │
//!                                                   ▼
//!                     ┌──────────────┐     ┌───────────────────┐
//!                     │ append_gain  │ ◄── │  compute_gain()   │
//!                     └──────────────┘     └───────────────────┘
//! ```
//!
//! Analysis is advisory: a failed, timed-out or unparsable measurement pass
//! yields `None` and the render proceeds without normalization.

#![deny(unsafe_code)]

mod analyzer;
mod error;
mod normalizer;

pub use analyzer::{
    analysis_args, analyze, parse_measurement, AnalysisOptions, LoudnessAnalysis, ANALYSIS_PHASE,
};
pub use error::{LoudnessError, Result};
pub use normalizer::{
    append_gain, GainDecision, LoudnessNormalizer, Normalization, NormalizationTarget, SkipReason,
};

/// Streaming reference level (-14 LUFS)
pub const DEFAULT_TARGET_LUFS: f64 = -14.0;

/// Largest cut applied in one pass
pub const DEFAULT_MAX_DOWN_DB: f64 = -12.0;

/// Largest boost applied in one pass
pub const DEFAULT_MAX_UP_DB: f64 = 12.0;

/// True-peak ceiling after gain (dBTP)
pub const DEFAULT_TRUE_PEAK_CEILING_DBTP: f64 = -1.0;

/// Inputs below this integrated loudness are treated as silence
pub const DEFAULT_SILENCE_FLOOR_LUFS: f64 = -60.0;

/// Corrections smaller than this are skipped
pub const DEFAULT_NEGLIGIBLE_GAIN_DB: f64 = 0.5;
