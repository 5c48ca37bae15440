//! Millisecond time ranges
//!
//! `TimeRange` is what the edit-list collaborator hands us (already padded,
//! merged and clamped); `QuietCandidate` is what the quiet-region detector
//! hands back. Both use integer millisecond bounds.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Convert seconds (as printed by the media tool) to whole milliseconds
///
/// Rounds to the nearest millisecond; negative and non-finite input clamps to zero.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

/// Convert milliseconds to fractional seconds
pub fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

/// Format milliseconds as a seconds argument with millisecond precision (`"1.500"`)
pub fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// A half-open span of media time in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    /// Create a range, rejecting `end_ms < start_ms`
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self> {
        if end_ms < start_ms {
            return Err(CoreError::InvalidRange { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    /// Input-seek arguments selecting this range (`-ss <start> -t <duration>`)
    pub fn seek_args(&self) -> Vec<String> {
        vec![
            "-ss".to_string(),
            format_seconds(self.start_ms),
            "-t".to_string(),
            format_seconds(self.duration_ms()),
        ]
    }
}

/// A quiet region found by the detector
///
/// Recomputed on every analysis; carries no identity across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuietCandidate {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl QuietCandidate {
    /// Create a candidate, rejecting `end_ms < start_ms`
    pub fn new(start_ms: u64, end_ms: u64) -> Result<Self> {
        if end_ms < start_ms {
            return Err(CoreError::InvalidRange { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    pub fn as_range(&self) -> TimeRange {
        TimeRange {
            start_ms: self.start_ms,
            end_ms: self.end_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_ranges() {
        assert_eq!(
            TimeRange::new(2_000, 1_000),
            Err(CoreError::InvalidRange {
                start_ms: 2_000,
                end_ms: 1_000
            })
        );
        assert!(QuietCandidate::new(5, 4).is_err());
        assert!(QuietCandidate::new(5, 5).is_ok());
    }

    #[test]
    fn seconds_round_to_nearest_ms() {
        assert_eq!(seconds_to_ms(1.234), 1_234);
        assert_eq!(seconds_to_ms(2.5676), 2_568);
        assert_eq!(seconds_to_ms(-0.2), 0);
        assert_eq!(seconds_to_ms(f64::NAN), 0);
    }

    #[test]
    fn seek_args_use_millisecond_precision() {
        let range = TimeRange::new(61_005, 62_000).unwrap();
        assert_eq!(range.seek_args(), vec!["-ss", "61.005", "-t", "0.995"]);
        assert_eq!(format_seconds(0), "0.000");
    }
}
