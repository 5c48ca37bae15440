//! Filter chain compilation for quietcut
//!
//! This crate turns typed DSP stage descriptors into the filter-graph string
//! handed to the media tool's `-af` option.
//!
//! # Stage order
//!
//! ```text
//! noise reduction ─► high-pass ─► low-pass ─► parametric EQ ─► compressor/limiter ─► auto-level
//! ```
//!
//! Frequency shaping runs on a denoised, band-limited signal before dynamics
//! control, and auto-leveling is always last. The order is fixed regardless of
//! the order descriptors are supplied in.
//!
//! # Example
//!
//! ```rust
//! use quietcut_filters::{compile_filters, EqBand, EqualizerParams, FilterStage, PassFilterParams};
//!
//! let graph = compile_filters(&[
//!     FilterStage::Equalizer(EqualizerParams::new(vec![EqBand::new(3_000.0, 2.0, 1.4)])),
//!     FilterStage::Pass(PassFilterParams::new(Some(80.0), None)),
//! ]);
//! assert_eq!(graph, "highpass=f=80,equalizer=f=3000:t=q:w=1.4:g=2");
//! ```

#![deny(unsafe_code)]

mod compiler;
mod error;
mod stage;

pub use compiler::{compile_filters, volume_filter, FilterChain};
pub use error::FilterError;
pub use stage::{
    AutoMixParams, BandShape, CompressorMode, CompressorParams, EqBand, EqualizerParams,
    FilterStage, NoiseReductionParams, PassFilterParams, StageKind, MAX_EQ_GAIN_DB, MAX_EQ_Q,
    MAX_FREQUENCY_HZ, MIN_EQ_Q, MIN_FREQUENCY_HZ,
};
