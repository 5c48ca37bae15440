//! Second pass: gain decision
//!
//! Turns a measurement into the gain the render pass should apply. The checks
//! run in a fixed order and peak safety always wins over reaching the target.

use crate::analyzer::{analyze, AnalysisOptions, LoudnessAnalysis};
use crate::error::{LoudnessError, Result};
use crate::{
    DEFAULT_MAX_DOWN_DB, DEFAULT_MAX_UP_DB, DEFAULT_NEGLIGIBLE_GAIN_DB, DEFAULT_SILENCE_FLOOR_LUFS,
    DEFAULT_TARGET_LUFS, DEFAULT_TRUE_PEAK_CEILING_DBTP,
};
use quietcut_filters::volume_filter;
use quietcut_jobs::JobRunner;
use serde::{Deserialize, Serialize};

/// Loudness target and safety limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationTarget {
    /// Integrated loudness to aim for in LUFS
    pub target_lufs: f64,
    /// Largest cut in dB (negative)
    pub max_down_db: f64,
    /// Largest boost in dB
    pub max_up_db: f64,
    /// Projected true peak may not exceed this (dBTP)
    pub true_peak_ceiling_dbtp: f64,
    /// Inputs quieter than this are left alone
    pub silence_floor_lufs: f64,
    /// Gains smaller than this are not worth a render
    pub negligible_gain_db: f64,
}

impl Default for NormalizationTarget {
    fn default() -> Self {
        Self {
            target_lufs: DEFAULT_TARGET_LUFS,
            max_down_db: DEFAULT_MAX_DOWN_DB,
            max_up_db: DEFAULT_MAX_UP_DB,
            true_peak_ceiling_dbtp: DEFAULT_TRUE_PEAK_CEILING_DBTP,
            silence_floor_lufs: DEFAULT_SILENCE_FLOOR_LUFS,
            negligible_gain_db: DEFAULT_NEGLIGIBLE_GAIN_DB,
        }
    }
}

impl NormalizationTarget {
    pub fn with_target(target_lufs: f64) -> Self {
        Self {
            target_lufs,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            self.target_lufs,
            self.max_down_db,
            self.max_up_db,
            self.true_peak_ceiling_dbtp,
            self.silence_floor_lufs,
            self.negligible_gain_db,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LoudnessError::InvalidTarget(
                "all values must be finite".to_string(),
            ));
        }
        if self.max_down_db > 0.0 || self.max_up_db < 0.0 {
            return Err(LoudnessError::InvalidTarget(format!(
                "gain window [{}, {}] must contain 0 dB",
                self.max_down_db, self.max_up_db
            )));
        }
        if self.negligible_gain_db < 0.0 {
            return Err(LoudnessError::InvalidTarget(
                "negligible gain must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Gain decision for one measurement
    pub fn decide(&self, analysis: &LoudnessAnalysis) -> GainDecision {
        if let Err(e) = self.validate() {
            tracing::warn!("Not normalizing: {}", e);
            return GainDecision::Skip { reason: SkipReason::InvalidTarget };
        }

        // 1. Near-silent input: nothing meaningful to match
        if !analysis.integrated_lufs.is_finite()
            || analysis.integrated_lufs < self.silence_floor_lufs
        {
            return GainDecision::Skip { reason: SkipReason::NearSilent };
        }

        // 2-3. Distance to target, limited to the allowed window
        let mut gain = (self.target_lufs - analysis.integrated_lufs)
            .max(self.max_down_db)
            .min(self.max_up_db);

        // 4. Clip prevention
        if analysis.true_peak_dbtp.is_finite()
            && analysis.true_peak_dbtp + gain > self.true_peak_ceiling_dbtp
        {
            gain = self.true_peak_ceiling_dbtp - analysis.true_peak_dbtp;
        }

        // 5. Not worth a render
        if gain.abs() < self.negligible_gain_db {
            return GainDecision::Skip { reason: SkipReason::Negligible };
        }

        GainDecision::Apply { gain_db: gain }
    }

    /// Gain in dB to apply, or `None` when normalization should be skipped
    pub fn compute_gain(&self, analysis: &LoudnessAnalysis) -> Option<f64> {
        self.decide(analysis).gain_db()
    }
}

/// Why no gain is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The measurement pass produced nothing usable
    AnalysisUnavailable,
    /// The target itself is unusable (non-finite or an inverted window)
    InvalidTarget,
    NearSilent,
    Negligible,
}

/// Outcome of the gain computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GainDecision {
    Apply { gain_db: f64 },
    Skip { reason: SkipReason },
}

impl GainDecision {
    pub fn gain_db(&self) -> Option<f64> {
        match self {
            Self::Apply { gain_db } => Some(*gain_db),
            Self::Skip { .. } => None,
        }
    }
}

/// Append the gain stage to a filter chain
pub fn append_gain(chain: &str, gain_db: f64) -> String {
    let chain = chain.trim().trim_matches(',');
    if chain.is_empty() {
        volume_filter(gain_db)
    } else {
        format!("{},{}", chain, volume_filter(gain_db))
    }
}

/// Measurement plus decision for one input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    pub analysis: Option<LoudnessAnalysis>,
    pub decision: GainDecision,
}

impl Normalization {
    /// Filter chain for the render pass
    pub fn render_chain(&self, existing_chain: &str) -> String {
        match self.decision.gain_db() {
            Some(gain) => append_gain(existing_chain, gain),
            None => existing_chain.trim().trim_matches(',').to_string(),
        }
    }
}

/// Two-pass loudness normalizer
///
/// # Example
///
/// ```
/// use quietcut_loudness::{LoudnessAnalysis, LoudnessNormalizer, NormalizationTarget};
///
/// let normalizer = LoudnessNormalizer::new(NormalizationTarget::with_target(-14.0));
/// let quiet_take = LoudnessAnalysis {
///     integrated_lufs: -20.0,
///     true_peak_dbtp: -9.0,
///     loudness_range_lu: 5.0,
///     threshold_db: -30.0,
/// };
/// assert_eq!(normalizer.compute_gain(&quiet_take), Some(6.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoudnessNormalizer {
    target: NormalizationTarget,
}

impl LoudnessNormalizer {
    pub fn new(target: NormalizationTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &NormalizationTarget {
        &self.target
    }

    pub fn compute_gain(&self, analysis: &LoudnessAnalysis) -> Option<f64> {
        self.target.compute_gain(analysis)
    }

    /// Measure `input` and decide the gain for the render pass
    pub async fn normalize<R: JobRunner + ?Sized>(
        &self,
        runner: &R,
        input: &str,
        options: &AnalysisOptions,
    ) -> Normalization {
        let analysis = analyze(runner, input, options).await;
        let decision = match &analysis {
            Some(analysis) => self.target.decide(analysis),
            None => GainDecision::Skip { reason: SkipReason::AnalysisUnavailable },
        };
        match decision {
            GainDecision::Apply { gain_db } => {
                tracing::info!("Normalizing {} by {:+.2} dB", input, gain_db);
            }
            GainDecision::Skip { reason } => {
                tracing::info!("Skipping normalization of {}: {:?}", input, reason);
            }
        }
        Normalization { analysis, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(integrated_lufs: f64, true_peak_dbtp: f64) -> LoudnessAnalysis {
        LoudnessAnalysis {
            integrated_lufs,
            true_peak_dbtp,
            loudness_range_lu: 6.0,
            threshold_db: -30.0,
        }
    }

    #[test]
    fn on_target_input_is_negligible() {
        let target = NormalizationTarget::with_target(-14.0);
        assert_eq!(target.compute_gain(&measured(-14.0, -1.0)), None);
        assert_eq!(
            target.decide(&measured(-14.2, -3.0)),
            GainDecision::Skip { reason: SkipReason::Negligible }
        );
    }

    #[test]
    fn unusable_target_skips_instead_of_panicking() {
        let inverted = NormalizationTarget {
            max_down_db: 6.0,
            max_up_db: -6.0,
            ..NormalizationTarget::default()
        };
        let unset = NormalizationTarget::with_target(f64::NAN);

        for target in [inverted, unset] {
            assert_eq!(
                target.decide(&measured(-20.0, -9.0)),
                GainDecision::Skip { reason: SkipReason::InvalidTarget }
            );
            assert_eq!(target.compute_gain(&measured(-20.0, -9.0)), None);
        }
    }

    #[test]
    fn peak_ceiling_wins_over_target() {
        let target = NormalizationTarget::with_target(-14.0);
        // Wants +6 dB, but the peak would land at +4 dBTP
        assert_eq!(target.compute_gain(&measured(-20.0, -2.0)), Some(1.0));
    }

    #[test]
    fn peak_ceiling_can_force_a_cut() {
        let target = NormalizationTarget::with_target(-14.0);
        assert_eq!(target.compute_gain(&measured(-14.0, 1.0)), Some(-2.0));
    }

    #[test]
    fn gain_is_clamped_to_window() {
        let target = NormalizationTarget::with_target(-14.0);
        assert_eq!(target.compute_gain(&measured(-40.0, -30.0)), Some(12.0));
        assert_eq!(target.compute_gain(&measured(0.0, -30.0)), Some(-12.0));
    }

    #[test]
    fn near_silent_input_is_skipped() {
        let target = NormalizationTarget::default();
        assert_eq!(
            target.decide(&measured(-65.0, -50.0)),
            GainDecision::Skip { reason: SkipReason::NearSilent }
        );
        assert_eq!(
            target.decide(&measured(f64::NEG_INFINITY, f64::NEG_INFINITY)),
            GainDecision::Skip { reason: SkipReason::NearSilent }
        );
    }

    #[test]
    fn append_gain_extends_chain() {
        assert_eq!(append_gain("", 3.5), "volume=3.5dB");
        assert_eq!(
            append_gain("highpass=f=80,", -2.0),
            "highpass=f=80,volume=-2dB"
        );
    }

    #[test]
    fn validate_rejects_inverted_window() {
        assert!(NormalizationTarget::default().validate().is_ok());
        let inverted = NormalizationTarget {
            max_down_db: 3.0,
            ..NormalizationTarget::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(LoudnessError::InvalidTarget(_))
        ));
    }
}
