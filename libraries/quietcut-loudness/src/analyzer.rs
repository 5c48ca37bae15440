//! First pass: loudness measurement
//!
//! The measurement pass runs the media tool's EBU R128 filter in JSON mode
//! over the input, with any existing filter chain applied first, and discards
//! the audio. The filter prints its result as a JSON object in the diagnostic
//! stream:
//!
//! ```text
//! [Parsed_loudnorm_1 @ 0x5581]
//! {
//!     "input_i" : "-23.54",
//!     "input_tp" : "-7.96",
//!     "input_lra" : "4.20",
//!     "input_thresh" : "-34.04",
//!     ...
//! }
//! ```

use crate::error::{LoudnessError, Result};
use quietcut_core::{ms_to_seconds, TimeRange};
use quietcut_jobs::{JobRunner, RunRequest};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Key that identifies the measurement block
const INTEGRATED_KEY: &str = "input_i";

/// Filter appended to the chain for the measurement pass
const MEASUREMENT_FILTER: &str = "loudnorm=print_format=json";

/// Phase label of the measurement pass
pub const ANALYSIS_PHASE: &str = "loudness-analysis";

/// Result of one measurement pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessAnalysis {
    /// Integrated loudness in LUFS
    pub integrated_lufs: f64,
    /// True peak in dBTP
    pub true_peak_dbtp: f64,
    /// Loudness range in LU
    pub loudness_range_lu: f64,
    /// Gating threshold in dB
    pub threshold_db: f64,
}

/// Settings for the measurement pass
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Filter chain already applied to the audio, measured through
    pub existing_chain: String,
    /// Measure only this span of the input
    pub window: Option<TimeRange>,
    pub timeout: Option<Duration>,
    /// Duration of the input, for progress when no window is set
    pub input_duration: Option<Duration>,
}

/// Arguments for the measurement pass
pub fn analysis_args(input: &str, options: &AnalysisOptions) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into()];
    if let Some(window) = &options.window {
        args.extend(window.seek_args());
    }
    args.extend(["-i".into(), input.to_string(), "-vn".into()]);

    let chain = options.existing_chain.trim().trim_matches(',');
    let graph = if chain.is_empty() {
        MEASUREMENT_FILTER.to_string()
    } else {
        format!("{},{}", chain, MEASUREMENT_FILTER)
    };
    args.extend(["-af".into(), graph, "-f".into(), "null".into(), "-".into()]);
    args
}

/// Measure `input` through `existing_chain`, optionally limited to `window`
///
/// Returns `None` when the pass fails, times out, or prints no usable
/// measurement. Loudness is advisory, so none of these stop a render.
pub async fn analyze<R: JobRunner + ?Sized>(
    runner: &R,
    input: &str,
    options: &AnalysisOptions,
) -> Option<LoudnessAnalysis> {
    let mut request = RunRequest::new(analysis_args(input, options)).phase(ANALYSIS_PHASE);
    request.timeout = options.timeout;
    request.expected_duration = options
        .window
        .map(|w| Duration::from_secs_f64(ms_to_seconds(w.duration_ms())))
        .or(options.input_duration);

    let output = match runner.run(request).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Loudness analysis of {} failed: {}", input, e);
            return None;
        }
    };

    match parse_measurement(&output.diagnostic_text) {
        Ok(analysis) => {
            tracing::debug!(
                "Measured {}: {:.2} LUFS, {:.2} dBTP, LRA {:.2}",
                input,
                analysis.integrated_lufs,
                analysis.true_peak_dbtp,
                analysis.loudness_range_lu
            );
            Some(analysis)
        }
        Err(e) => {
            tracing::warn!("Loudness analysis of {} unusable: {}", input, e);
            None
        }
    }
}

/// Parse the last measurement block in a diagnostic stream
pub fn parse_measurement(text: &str) -> Result<LoudnessAnalysis> {
    let block = last_measurement_block(text).ok_or(LoudnessError::MissingMeasurement)?;
    let value: Value = serde_json::from_str(block)
        .map_err(|e| LoudnessError::InvalidMeasurement(e.to_string()))?;

    Ok(LoudnessAnalysis {
        integrated_lufs: field(&value, INTEGRATED_KEY)?,
        true_peak_dbtp: field(&value, "input_tp")?,
        loudness_range_lu: field(&value, "input_lra")?,
        threshold_db: field(&value, "input_thresh")?,
    })
}

/// The `{ ... }` object around the last occurrence of the integrated key
fn last_measurement_block(text: &str) -> Option<&str> {
    let key = text.rfind(&format!("\"{}\"", INTEGRATED_KEY))?;
    let start = text[..key].rfind('{')?;
    let end = key + text[key..].find('}')?;
    Some(&text[start..=end])
}

/// Numeric field that may be printed either as a string or a number
///
/// Silent input is reported as `"-inf"`, which parses to negative infinity.
fn field(value: &Value, key: &str) -> Result<f64> {
    let number = match value.get(key) {
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Number(number)) => number.as_f64(),
        _ => None,
    };
    number
        .filter(|n| !n.is_nan())
        .ok_or_else(|| LoudnessError::InvalidMeasurement(format!("missing or invalid {}", key)))
}
