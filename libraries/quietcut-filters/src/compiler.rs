/// Filter chain compiler
///
/// Turns stage descriptors into a single comma-separated filter graph. Stages
/// are placed into fixed slots and emitted in [`StageKind::ORDER`]; disabled and
/// zero-effect stages produce nothing, so an empty string means "no filtering".
use crate::stage::{
    AutoMixParams, BandShape, CompressorMode, CompressorParams, EqualizerParams, FilterStage,
    NoiseReductionParams, PassFilterParams, StageKind,
};

/// Compile stage descriptors into a filter graph string
pub fn compile_filters(stages: &[FilterStage]) -> String {
    FilterChain::from_stages(stages).compile()
}

/// Stage descriptors sorted into their pipeline slots
///
/// A later descriptor of the same kind replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    noise_reduction: Option<NoiseReductionParams>,
    pass: Option<PassFilterParams>,
    equalizer: Option<EqualizerParams>,
    compressor: Option<CompressorParams>,
    auto_mix: Option<AutoMixParams>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_stages(stages: &[FilterStage]) -> Self {
        let mut chain = Self::new();
        for stage in stages {
            chain.set(stage.clone());
        }
        chain
    }

    /// Place a descriptor into its slot
    pub fn set(&mut self, stage: FilterStage) {
        if !stage.is_enabled() {
            tracing::debug!("Skipping disabled {} stage", stage.name());
        }
        match stage {
            FilterStage::NoiseReduction(p) => self.noise_reduction = Some(p),
            FilterStage::Pass(p) => self.pass = Some(p),
            FilterStage::Equalizer(p) => self.equalizer = Some(p),
            FilterStage::Compressor(p) => self.compressor = Some(p),
            FilterStage::AutoMix(p) => self.auto_mix = Some(p),
        }
    }

    /// Filters emitted by one slot (empty if disabled or zero-effect)
    pub fn slot_filters(&self, kind: StageKind) -> Vec<String> {
        match kind {
            StageKind::NoiseReduction => self
                .noise_reduction
                .as_ref()
                .map(noise_reduction_filters)
                .unwrap_or_default(),
            StageKind::HighPass => self
                .pass
                .as_ref()
                .filter(|p| p.enabled)
                .and_then(|p| p.clamped().highpass_hz)
                .map(|hz| vec![format!("highpass=f={}", num(hz))])
                .unwrap_or_default(),
            StageKind::LowPass => self
                .pass
                .as_ref()
                .filter(|p| p.enabled)
                .and_then(|p| p.clamped().lowpass_hz)
                .map(|hz| vec![format!("lowpass=f={}", num(hz))])
                .unwrap_or_default(),
            StageKind::Equalizer => self
                .equalizer
                .as_ref()
                .map(equalizer_filters)
                .unwrap_or_default(),
            StageKind::Compressor => self
                .compressor
                .as_ref()
                .map(compressor_filters)
                .unwrap_or_default(),
            StageKind::AutoMix => self
                .auto_mix
                .as_ref()
                .map(auto_mix_filters)
                .unwrap_or_default(),
        }
    }

    /// Emit the filter graph in pipeline order
    pub fn compile(&self) -> String {
        let filters: Vec<String> = StageKind::ORDER
            .iter()
            .flat_map(|kind| self.slot_filters(*kind))
            .collect();
        filters.join(",")
    }
}

fn noise_reduction_filters(params: &NoiseReductionParams) -> Vec<String> {
    let p = params.clamped();
    if !p.enabled || p.reduction_db <= 0.0 {
        return Vec::new();
    }
    vec![format!(
        "afftdn=nr={}:nf={}",
        num(p.reduction_db),
        num(p.noise_floor_db)
    )]
}

fn equalizer_filters(params: &EqualizerParams) -> Vec<String> {
    if !params.enabled {
        return Vec::new();
    }
    params
        .bands
        .iter()
        .filter(|band| band.enabled)
        .map(|band| band.clamped())
        .filter(|band| band.gain_db != 0.0)
        .map(|band| {
            let name = match band.shape {
                BandShape::Peaking => "equalizer",
                BandShape::LowShelf => "lowshelf",
                BandShape::HighShelf => "highshelf",
            };
            format!(
                "{}=f={}:t=q:w={}:g={}",
                name,
                num(band.frequency),
                num(band.q),
                num(band.gain_db)
            )
        })
        .collect()
}

fn compressor_filters(params: &CompressorParams) -> Vec<String> {
    let p = params.clamped();
    if !p.enabled {
        return Vec::new();
    }

    let mut filters = Vec::new();
    match p.mode {
        CompressorMode::Level => {
            if p.makeup_db > 0.0 {
                filters.push(volume_filter(p.makeup_db));
            }
        }
        CompressorMode::Limit => {
            if let Some(hz) = p.detector_highpass_hz {
                filters.push(format!("highpass=f={}", num(hz)));
            }
            filters.push(format!(
                "alimiter=limit={}:level=disabled",
                num(db_to_linear(p.ceiling_db))
            ));
            if p.makeup_db > 0.0 {
                filters.push(volume_filter(p.makeup_db));
            }
        }
        CompressorMode::Comp => {
            // Unity ratio without makeup is an identity transfer curve
            if p.ratio <= 1.0 && p.makeup_db <= 0.0 {
                return Vec::new();
            }
            if let Some(hz) = p.detector_highpass_hz {
                filters.push(format!("highpass=f={}", num(hz)));
            }
            let out_at_full_scale = p.threshold_db - p.threshold_db / p.ratio;
            filters.push(format!(
                "compand=attacks={}:decays={}:points=-90/-90|{}/{}|0/{}:gain={}",
                num(p.attack_ms / 1000.0),
                num(p.release_ms / 1000.0),
                num(p.threshold_db),
                num(p.threshold_db),
                num(out_at_full_scale),
                num(p.makeup_db)
            ));
        }
    }
    filters
}

fn auto_mix_filters(params: &AutoMixParams) -> Vec<String> {
    let p = params.clamped();
    if !p.enabled {
        return Vec::new();
    }
    vec![format!(
        "dynaudnorm=f={}:g={}:p={}:m={}",
        p.frame_ms,
        p.window_frames,
        num(p.peak),
        num(p.max_gain)
    )]
}

/// `volume=<gain>dB`
pub fn volume_filter(gain_db: f64) -> String {
    format!("volume={}dB", num(gain_db))
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Render a number with at most four decimals and no trailing zeros
pub(crate) fn num(value: f64) -> String {
    let mut text = format!("{:.4}", value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
