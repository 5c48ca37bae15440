//! Parsers for the detection filters' diagnostic markers
//!
//! ```text
//! [Parsed_volumedetect_0 @ 0x1] mean_volume: -27.3 dB
//! [Parsed_volumedetect_0 @ 0x1] max_volume: -4.1 dB
//! [silencedetect @ 0x2] silence_start: 1.234
//! [silencedetect @ 0x2] silence_end: 2.567 | silence_duration: 1.333
//! ```

use quietcut_core::{seconds_to_ms, QuietCandidate};
use serde::Serialize;
use std::cmp::Reverse;

/// Output of the volume pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeStats {
    pub mean_volume_db: f64,
    pub max_volume_db: Option<f64>,
}

/// Number following `key` on a line
fn number_after(line: &str, key: &str) -> Option<f64> {
    let (_, rest) = line.split_once(key)?;
    let token = rest
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '|')
        .next()?;
    token.parse::<f64>().ok()
}

/// Read `mean_volume` and `max_volume` from volume pass output
///
/// Returns `None` when no finite mean volume is present.
pub fn parse_volume_stats(text: &str) -> Option<VolumeStats> {
    let mut mean = None;
    let mut max = None;
    for line in text.lines() {
        if let Some(value) = number_after(line, "mean_volume:") {
            mean = Some(value);
        } else if let Some(value) = number_after(line, "max_volume:") {
            max = Some(value);
        }
    }
    mean.filter(|m| m.is_finite()).map(|mean_volume_db| VolumeStats {
        mean_volume_db,
        max_volume_db: max,
    })
}

/// Pair `silence_start`/`silence_end` markers into candidates
///
/// A start with no following end (silence running to the end of the input)
/// yields nothing. An end with no preceding start is ignored.
pub fn parse_silence_markers(text: &str) -> Vec<QuietCandidate> {
    let mut candidates = Vec::new();
    let mut open: Option<u64> = None;

    for line in text.lines() {
        if let Some(start) = number_after(line, "silence_start:") {
            open = Some(seconds_to_ms(start));
        } else if let Some(end) = number_after(line, "silence_end:") {
            let Some(start_ms) = open.take() else {
                continue;
            };
            if let Ok(candidate) = QuietCandidate::new(start_ms, seconds_to_ms(end)) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Longest first, earliest first among equals, at most `max` entries
pub fn rank_candidates(mut candidates: Vec<QuietCandidate>, max: usize) -> Vec<QuietCandidate> {
    candidates.sort_by_key(|c| (Reverse(c.duration_ms()), c.start_ms));
    candidates.truncate(max);
    candidates
}
