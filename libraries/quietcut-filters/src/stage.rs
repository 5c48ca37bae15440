/// DSP stage descriptors
///
/// Immutable value objects describing one processing stage each. Every numeric
/// field has a documented safe range; `clamped()` returns a copy with all
/// fields pulled into range, and the compiler only ever emits clamped values.
use crate::error::FilterError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lowest frequency accepted by any stage (Hz)
pub const MIN_FREQUENCY_HZ: f64 = 20.0;
/// Highest frequency accepted by any stage (Hz)
pub const MAX_FREQUENCY_HZ: f64 = 20_000.0;
/// EQ band gain range (dB)
pub const MAX_EQ_GAIN_DB: f64 = 24.0;
/// EQ band Q range
pub const MIN_EQ_Q: f64 = 0.1;
pub const MAX_EQ_Q: f64 = 10.0;

fn clamp_frequency(hz: f64) -> f64 {
    hz.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ)
}

/// One stage of the processing chain
///
/// The order descriptors are supplied in does not matter; the compiler always
/// emits stages in the fixed pipeline order (see [`StageKind::ORDER`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStage {
    NoiseReduction(NoiseReductionParams),
    Pass(PassFilterParams),
    Equalizer(EqualizerParams),
    Compressor(CompressorParams),
    AutoMix(AutoMixParams),
}

impl FilterStage {
    /// Whether the descriptor is switched on
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::NoiseReduction(p) => p.enabled,
            Self::Pass(p) => p.enabled,
            Self::Equalizer(p) => p.enabled,
            Self::Compressor(p) => p.enabled,
            Self::AutoMix(p) => p.enabled,
        }
    }

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoiseReduction(_) => "noise_reduction",
            Self::Pass(_) => "pass",
            Self::Equalizer(_) => "equalizer",
            Self::Compressor(_) => "compressor",
            Self::AutoMix(_) => "auto_mix",
        }
    }
}

/// Position of a stage in the compiled chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    NoiseReduction,
    HighPass,
    LowPass,
    Equalizer,
    Compressor,
    AutoMix,
}

impl StageKind {
    /// Pipeline order: denoise, band-limit, shape, control dynamics, level last
    pub const ORDER: [StageKind; 6] = [
        StageKind::NoiseReduction,
        StageKind::HighPass,
        StageKind::LowPass,
        StageKind::Equalizer,
        StageKind::Compressor,
        StageKind::AutoMix,
    ];
}

// ===== Noise reduction =====

/// FFT denoiser settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseReductionParams {
    pub enabled: bool,
    /// Amount of noise reduction in dB (0 to 97, 0 = no effect)
    pub reduction_db: f64,
    /// Estimated noise floor in dB (-80 to -20)
    pub noise_floor_db: f64,
}

impl NoiseReductionParams {
    pub const MAX_REDUCTION_DB: f64 = 97.0;

    pub fn new(reduction_db: f64) -> Self {
        Self {
            enabled: true,
            reduction_db,
            ..Self::default()
        }
    }

    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            reduction_db: self.reduction_db.clamp(0.0, Self::MAX_REDUCTION_DB),
            noise_floor_db: self.noise_floor_db.clamp(-80.0, -20.0),
        }
    }
}

impl Default for NoiseReductionParams {
    fn default() -> Self {
        Self {
            enabled: false,
            reduction_db: 12.0,
            noise_floor_db: -50.0,
        }
    }
}

// ===== High/low pass =====

/// Band-limiting filters; either edge may be left off
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PassFilterParams {
    pub enabled: bool,
    /// High-pass cutoff in Hz (20 to 20000)
    pub highpass_hz: Option<f64>,
    /// Low-pass cutoff in Hz (20 to 20000)
    pub lowpass_hz: Option<f64>,
}

impl PassFilterParams {
    pub fn new(highpass_hz: Option<f64>, lowpass_hz: Option<f64>) -> Self {
        Self {
            enabled: true,
            highpass_hz,
            lowpass_hz,
        }
    }

    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            highpass_hz: self.highpass_hz.map(clamp_frequency),
            lowpass_hz: self.lowpass_hz.map(clamp_frequency),
        }
    }
}

// ===== Parametric EQ =====

/// Filter type for EQ bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandShape {
    /// Boosts/cuts below frequency
    LowShelf,
    /// Boosts/cuts around frequency with Q bandwidth
    #[default]
    Peaking,
    /// Boosts/cuts above frequency
    HighShelf,
}

/// EQ band configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqBand {
    pub enabled: bool,
    /// Center frequency in Hz (20 to 20000)
    pub frequency: f64,
    /// Gain in dB (-24 to +24), 0 = no effect
    pub gain_db: f64,
    /// Q factor (0.1 to 10.0)
    pub q: f64,
    pub shape: BandShape,
}

impl EqBand {
    /// Create a peaking band
    pub fn new(frequency: f64, gain_db: f64, q: f64) -> Self {
        Self {
            enabled: true,
            frequency,
            gain_db,
            q,
            shape: BandShape::Peaking,
        }
    }

    /// Create a low shelf band (Butterworth Q)
    pub fn low_shelf(frequency: f64, gain_db: f64) -> Self {
        Self {
            shape: BandShape::LowShelf,
            ..Self::new(frequency, gain_db, 0.707)
        }
    }

    /// Create a high shelf band (Butterworth Q)
    pub fn high_shelf(frequency: f64, gain_db: f64) -> Self {
        Self {
            shape: BandShape::HighShelf,
            ..Self::new(frequency, gain_db, 0.707)
        }
    }

    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            frequency: clamp_frequency(self.frequency),
            gain_db: self.gain_db.clamp(-MAX_EQ_GAIN_DB, MAX_EQ_GAIN_DB),
            q: self.q.clamp(MIN_EQ_Q, MAX_EQ_Q),
            shape: self.shape,
        }
    }
}

impl Default for EqBand {
    fn default() -> Self {
        Self::new(1_000.0, 0.0, 1.0)
    }
}

/// Parametric equalizer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerParams {
    pub enabled: bool,
    pub bands: Vec<EqBand>,
}

impl EqualizerParams {
    pub fn new(bands: Vec<EqBand>) -> Self {
        Self {
            enabled: true,
            bands,
        }
    }
}

// ===== Dynamics =====

/// How the dynamics stage behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressorMode {
    /// Makeup gain only
    Level,
    /// Hard limiter at the ceiling
    Limit,
    /// Ratio compressor
    #[default]
    Comp,
}

impl CompressorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Limit => "limit",
            Self::Comp => "comp",
        }
    }
}

impl FromStr for CompressorMode {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "level" => Ok(Self::Level),
            "limit" | "limiter" => Ok(Self::Limit),
            "comp" | "compress" | "compressor" => Ok(Self::Comp),
            other => Err(FilterError::UnknownCompressorMode(other.to_string())),
        }
    }
}

/// Compressor / limiter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorParams {
    pub enabled: bool,
    pub mode: CompressorMode,
    /// Threshold in dB (-60 to 0)
    pub threshold_db: f64,
    /// Ratio (1.0 to 20.0)
    pub ratio: f64,
    /// Attack time in milliseconds (0.1 to 100)
    pub attack_ms: f64,
    /// Release time in milliseconds (10 to 1000)
    pub release_ms: f64,
    /// Makeup gain in dB (0 to 24)
    pub makeup_db: f64,
    /// Limiter ceiling in dBFS (-24 to 0)
    pub ceiling_db: f64,
    /// High-pass ahead of the detector, keeps rumble from driving gain reduction
    pub detector_highpass_hz: Option<f64>,
}

impl CompressorParams {
    /// Moderate speech compression
    pub fn new() -> Self {
        Self {
            enabled: true,
            mode: CompressorMode::Comp,
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 50.0,
            makeup_db: 0.0,
            ceiling_db: -1.0,
            detector_highpass_hz: None,
        }
    }

    /// Makeup gain only
    pub fn level(makeup_db: f64) -> Self {
        Self {
            mode: CompressorMode::Level,
            makeup_db,
            ..Self::new()
        }
    }

    /// Brick-wall limiter at `ceiling_db`
    pub fn limit(ceiling_db: f64) -> Self {
        Self {
            mode: CompressorMode::Limit,
            ceiling_db,
            ..Self::new()
        }
    }

    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            mode: self.mode,
            threshold_db: self.threshold_db.clamp(-60.0, 0.0),
            ratio: self.ratio.clamp(1.0, 20.0),
            attack_ms: self.attack_ms.clamp(0.1, 100.0),
            release_ms: self.release_ms.clamp(10.0, 1000.0),
            makeup_db: self.makeup_db.clamp(0.0, 24.0),
            ceiling_db: self.ceiling_db.clamp(-24.0, 0.0),
            detector_highpass_hz: self.detector_highpass_hz.map(clamp_frequency),
        }
    }
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }
}

// ===== Auto-leveling =====

/// Dynamic auto-leveling, always the last stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMixParams {
    pub enabled: bool,
    /// Analysis frame length in milliseconds (10 to 8000)
    pub frame_ms: u32,
    /// Gaussian smoothing window in frames (3 to 301, odd)
    pub window_frames: u32,
    /// Target peak, linear (0.0 to 1.0)
    pub peak: f64,
    /// Maximum gain factor (1.0 to 100.0)
    pub max_gain: f64,
}

impl AutoMixParams {
    pub fn new() -> Self {
        Self {
            enabled: true,
            frame_ms: 500,
            window_frames: 31,
            peak: 0.95,
            max_gain: 10.0,
        }
    }

    pub fn clamped(&self) -> Self {
        let mut window = self.window_frames.clamp(3, 301);
        if window % 2 == 0 {
            window -= 1;
        }
        Self {
            enabled: self.enabled,
            frame_ms: self.frame_ms.clamp(10, 8000),
            window_frames: window,
            peak: self.peak.clamp(0.0, 1.0),
            max_gain: self.max_gain.clamp(1.0, 100.0),
        }
    }
}

impl Default for AutoMixParams {
    fn default() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }
}
