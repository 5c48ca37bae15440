/// Engine configuration
use crate::error::{EngineError, Result};
use quietcut_jobs::RegistryConfig;
use quietcut_loudness::NormalizationTarget;
use quietcut_silence::QuietDetectionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "quietcut.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuietcutConfig {
    #[serde(default = "default_tools")]
    pub tools: ToolSettings,

    #[serde(default = "default_jobs")]
    pub jobs: JobSettings,

    #[serde(default)]
    pub loudness: NormalizationTarget,

    #[serde(default)]
    pub quiet: QuietDetectionSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSettings {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default)]
    pub preserve_temp: bool,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    #[serde(default = "default_diagnostic_tail_lines")]
    pub diagnostic_tail_lines: usize,
}

impl QuietcutConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `quietcut.toml` in the working
    /// directory is used if present. `QUIETCUT_<SECTION>__<KEY>` environment
    /// variables override both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("QUIETCUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.jobs.default_timeout_secs == 0 {
            return Err(EngineError::Config(
                "jobs.default_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.tools.ffmpeg_path.as_os_str().is_empty() {
            return Err(EngineError::Config(
                "tools.ffmpeg_path must not be empty".to_string(),
            ));
        }

        self.loudness
            .validate()
            .map_err(|e| EngineError::Config(format!("loudness: {}", e)))?;
        self.quiet
            .validate()
            .map_err(|e| EngineError::Config(format!("quiet: {}", e)))?;

        Ok(())
    }

    /// Settings for the job registry
    pub fn registry_config(&self) -> RegistryConfig {
        let mut registry = RegistryConfig::new(self.jobs.temp_root.clone())
            .with_ffmpeg(self.tools.ffmpeg_path.clone())
            .with_ffprobe(self.tools.ffprobe_path.clone())
            .with_kill_grace(Duration::from_millis(self.jobs.kill_grace_ms));
        registry.default_timeout = Duration::from_secs(self.jobs.default_timeout_secs);
        registry.stale_after = Duration::from_secs(self.jobs.stale_after_secs);
        registry.preserve_temp = self.jobs.preserve_temp;
        registry.progress_interval = Duration::from_millis(self.jobs.progress_interval_ms);
        registry.diagnostic_tail_lines = self.jobs.diagnostic_tail_lines;
        registry
    }
}

// Default values
fn default_tools() -> ToolSettings {
    ToolSettings {
        ffmpeg_path: default_ffmpeg_path(),
        ffprobe_path: default_ffprobe_path(),
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_jobs() -> JobSettings {
    JobSettings {
        default_timeout_secs: default_timeout_secs(),
        kill_grace_ms: default_kill_grace_ms(),
        temp_root: default_temp_root(),
        stale_after_secs: default_stale_after_secs(),
        preserve_temp: false,
        progress_interval_ms: default_progress_interval_ms(),
        diagnostic_tail_lines: default_diagnostic_tail_lines(),
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_kill_grace_ms() -> u64 {
    2_000
}

fn default_temp_root() -> PathBuf {
    std::env::temp_dir().join("quietcut")
}

fn default_stale_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_progress_interval_ms() -> u64 {
    100
}

fn default_diagnostic_tail_lines() -> usize {
    40
}

impl Default for QuietcutConfig {
    fn default() -> Self {
        Self {
            tools: default_tools(),
            jobs: default_jobs(),
            loudness: NormalizationTarget::default(),
            quiet: QuietDetectionSettings::default(),
        }
    }
}
