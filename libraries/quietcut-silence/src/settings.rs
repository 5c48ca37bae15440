//! Detection settings

use crate::error::DetectionError;
use serde::{Deserialize, Serialize};

/// How the silence threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Measure the input's mean volume and derive the threshold from it
    #[default]
    Adaptive,
    /// Fixed, permissive threshold; skips the volume pass
    Permissive,
}

/// Quiet region detection settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuietDetectionSettings {
    pub mode: DetectionMode,
    /// Threshold sits this many dB below the mean volume
    pub offset_db: f64,
    /// Lowest threshold the adaptive mode may pick
    pub min_threshold_db: f64,
    /// Highest threshold the adaptive mode may pick
    pub max_threshold_db: f64,
    /// Threshold used in permissive mode
    pub permissive_threshold_db: f64,
    /// Quiet stretches shorter than this are ignored
    pub min_duration_secs: f64,
    /// At most this many candidates are returned
    pub max_candidates: usize,
}

impl Default for QuietDetectionSettings {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Adaptive,
            offset_db: 12.0,
            min_threshold_db: -60.0,
            max_threshold_db: -25.0,
            permissive_threshold_db: -20.0,
            min_duration_secs: 0.5,
            max_candidates: 10,
        }
    }
}

impl QuietDetectionSettings {
    /// Settings for verification runs: permissive threshold, no volume pass
    pub fn permissive() -> Self {
        Self {
            mode: DetectionMode::Permissive,
            ..Self::default()
        }
    }

    /// Silence threshold for an input with the given mean volume
    ///
    /// An inverted window is read with its bounds swapped.
    pub fn threshold_for(&self, mean_volume_db: f64) -> f64 {
        let low = self.min_threshold_db.min(self.max_threshold_db);
        let high = self.min_threshold_db.max(self.max_threshold_db);
        (mean_volume_db - self.offset_db).max(low).min(high)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(self.min_threshold_db.is_finite() && self.max_threshold_db.is_finite()) {
            return Err(DetectionError::InvalidSettings(
                "threshold window must be finite".to_string(),
            ));
        }
        if self.min_threshold_db > self.max_threshold_db {
            return Err(DetectionError::InvalidSettings(format!(
                "threshold window [{}, {}] is inverted",
                self.min_threshold_db, self.max_threshold_db
            )));
        }
        if !(self.min_duration_secs.is_finite() && self.min_duration_secs > 0.0) {
            return Err(DetectionError::InvalidSettings(
                "minimum duration must be positive".to_string(),
            ));
        }
        if self.max_candidates == 0 {
            return Err(DetectionError::InvalidSettings(
                "max candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
