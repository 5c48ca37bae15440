//! Quiet region detector
//!
//! Adaptive mode runs two passes: a volume pass measuring the input's mean
//! volume, then a silence pass whose threshold sits a fixed offset below that
//! mean. Permissive mode skips straight to the silence pass with a fixed
//! threshold.

use crate::error::DetectionError;
use crate::markers::{parse_silence_markers, parse_volume_stats, rank_candidates, VolumeStats};
use crate::settings::{DetectionMode, QuietDetectionSettings};
use quietcut_core::QuietCandidate;
use quietcut_jobs::{JobRunner, RunRequest};
use serde::Serialize;
use std::time::Duration;

pub const VOLUME_PHASE: &str = "quiet-volume";
pub const SILENCE_PHASE: &str = "quiet-detect";

/// Full result of a detection run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuietDetection {
    /// Volume pass result; absent in permissive mode
    pub volume: Option<VolumeStats>,
    pub threshold_db: f64,
    pub candidates: Vec<QuietCandidate>,
}

/// Arguments for the volume pass
pub fn volume_args(input: &str) -> Vec<String> {
    analysis_args(input, "volumedetect".to_string())
}

/// Arguments for the silence pass
pub fn silence_args(input: &str, threshold_db: f64, min_duration_secs: f64) -> Vec<String> {
    analysis_args(
        input,
        format!(
            "silencedetect=noise={:.1}dB:d={}",
            threshold_db, min_duration_secs
        ),
    )
}

fn analysis_args(input: &str, filter: String) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-i".into(),
        input.into(),
        "-vn".into(),
        "-af".into(),
        filter,
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}

/// Finds quiet stretches in an input
#[derive(Debug, Clone, Default)]
pub struct QuietRegionDetector {
    settings: QuietDetectionSettings,
    timeout: Option<Duration>,
}

impl QuietRegionDetector {
    pub fn new(settings: QuietDetectionSettings) -> Self {
        Self {
            settings,
            timeout: None,
        }
    }

    /// Per-pass timeout; the registry default applies otherwise
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn settings(&self) -> &QuietDetectionSettings {
        &self.settings
    }

    /// Ranked quiet regions of `input`; empty when any pass fails
    pub async fn detect<R: JobRunner + ?Sized>(
        &self,
        runner: &R,
        input: &str,
        expected_duration: Option<Duration>,
    ) -> Vec<QuietCandidate> {
        match self.try_detect(runner, input, expected_duration).await {
            Ok(detection) => detection.candidates,
            Err(e) => {
                tracing::warn!("Quiet region detection for {} degraded: {}", input, e);
                Vec::new()
            }
        }
    }

    /// Like `detect`, but also reports the volume stats and threshold used
    pub async fn try_detect<R: JobRunner + ?Sized>(
        &self,
        runner: &R,
        input: &str,
        expected_duration: Option<Duration>,
    ) -> Result<QuietDetection, DetectionError> {
        let settings = &self.settings;
        settings.validate()?;
        let (volume, threshold_db) = match settings.mode {
            DetectionMode::Permissive => (None, settings.permissive_threshold_db),
            DetectionMode::Adaptive => {
                let stats = self.measure_volume(runner, input, expected_duration).await?;
                (Some(stats), settings.threshold_for(stats.mean_volume_db))
            }
        };

        tracing::debug!(
            "Detecting quiet regions in {} below {:.1} dB",
            input,
            threshold_db
        );

        let request = self.request(
            silence_args(input, threshold_db, settings.min_duration_secs),
            SILENCE_PHASE,
            expected_duration,
        );
        let output = runner
            .run(request)
            .await
            .map_err(DetectionError::SilencePass)?;

        let candidates = rank_candidates(
            parse_silence_markers(&output.diagnostic_text),
            settings.max_candidates,
        );
        tracing::info!(
            "Found {} quiet regions in {} (threshold {:.1} dB)",
            candidates.len(),
            input,
            threshold_db
        );

        Ok(QuietDetection {
            volume,
            threshold_db,
            candidates,
        })
    }

    async fn measure_volume<R: JobRunner + ?Sized>(
        &self,
        runner: &R,
        input: &str,
        expected_duration: Option<Duration>,
    ) -> Result<VolumeStats, DetectionError> {
        let request = self.request(volume_args(input), VOLUME_PHASE, expected_duration);
        let output = runner
            .run(request)
            .await
            .map_err(DetectionError::VolumePass)?;
        let stats =
            parse_volume_stats(&output.diagnostic_text).ok_or(DetectionError::MissingVolume)?;
        tracing::debug!(
            "Volume of {}: mean {:.1} dB, max {:?} dB",
            input,
            stats.mean_volume_db,
            stats.max_volume_db
        );
        Ok(stats)
    }

    fn request(
        &self,
        args: Vec<String>,
        phase: &str,
        expected_duration: Option<Duration>,
    ) -> RunRequest {
        let mut request = RunRequest::new(args).phase(phase);
        request.timeout = self.timeout;
        request.expected_duration = expected_duration;
        request
    }
}
