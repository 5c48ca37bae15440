/// Engine facade
///
/// One `Engine` owns one job registry. Engines never share jobs, so several
/// can run side by side (each test builds its own).
use crate::config::QuietcutConfig;
use quietcut_core::{JobId, QuietCandidate};
use quietcut_filters::{compile_filters, FilterStage};
use quietcut_jobs::{
    probe_duration, try_strategies, CancelOutcome, JobRegistry, ProgressEvent, RenderAttempt,
    RenderContext, RenderError, RenderSuccess, RunOutput, RunRequest,
};
use quietcut_loudness::{
    analyze, AnalysisOptions, LoudnessAnalysis, LoudnessNormalizer, Normalization,
};
use quietcut_silence::{DetectionError, QuietDetection, QuietRegionDetector};
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct Engine {
    registry: JobRegistry,
    normalizer: LoudnessNormalizer,
    detector: QuietRegionDetector,
}

impl Engine {
    pub fn new(config: &QuietcutConfig) -> Self {
        Self {
            registry: JobRegistry::new(config.registry_config()),
            normalizer: LoudnessNormalizer::new(config.loudness),
            detector: QuietRegionDetector::new(config.quiet),
        }
    }

    pub fn from_parts(
        registry: JobRegistry,
        normalizer: LoudnessNormalizer,
        detector: QuietRegionDetector,
    ) -> Self {
        Self {
            registry,
            normalizer,
            detector,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one media-tool invocation
    pub async fn run(&self, request: RunRequest) -> quietcut_jobs::Result<RunOutput> {
        self.registry.run(request).await
    }

    /// Render with escalating strategies
    pub async fn try_strategies(
        &self,
        attempts: Vec<RenderAttempt>,
        context: &RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        try_strategies(&self.registry, attempts, context).await
    }

    pub async fn cancel(&self, id: &JobId) -> CancelOutcome {
        self.registry.cancel(id).await
    }

    pub fn compile_filters(&self, stages: &[FilterStage]) -> String {
        compile_filters(stages)
    }

    /// Measurement pass only
    pub async fn analyze_loudness(
        &self,
        input: &str,
        options: &AnalysisOptions,
    ) -> Option<LoudnessAnalysis> {
        analyze(&self.registry, input, options).await
    }

    /// Measurement pass plus gain decision
    pub async fn normalize_loudness(&self, input: &str, options: &AnalysisOptions) -> Normalization {
        self.normalizer
            .normalize(&self.registry, input, options)
            .await
    }

    pub async fn detect_quiet_regions(
        &self,
        input: &str,
        expected_duration: Option<Duration>,
    ) -> Vec<QuietCandidate> {
        self.detector
            .detect(&self.registry, input, expected_duration)
            .await
    }

    /// Detection with the volume stats and threshold that produced it
    pub async fn quiet_detection(
        &self,
        input: &str,
        expected_duration: Option<Duration>,
    ) -> Result<QuietDetection, DetectionError> {
        self.detector
            .try_detect(&self.registry, input, expected_duration)
            .await
    }

    pub async fn probe_duration(&self, input: &str) -> quietcut_jobs::Result<Duration> {
        probe_duration(&self.registry, input).await
    }

    /// Progress events from every job this engine runs
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.registry.subscribe()
    }

    pub async fn sweep_stale(&self) -> std::io::Result<usize> {
        self.registry.sweep_stale().await
    }

    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
