/// Registry configuration
use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget for one job (5 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Minimum spacing between progress events for one job
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Settings shared by every job a registry launches
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Media-processing binary
    pub ffmpeg_path: PathBuf,
    /// Companion probe binary
    pub ffprobe_path: PathBuf,
    /// Directory holding one `job-<id>` directory per job
    pub temp_root: PathBuf,
    /// Timeout used when a request does not set one
    pub default_timeout: Duration,
    /// How long a process gets to quit after the stop request before it is killed
    pub kill_grace: Duration,
    /// Job directories older than this are removed by the stale sweep
    pub stale_after: Duration,
    /// Skip the stale sweep entirely (keeps intermediates for debugging)
    pub preserve_temp: bool,
    pub progress_interval: Duration,
    /// Lines of diagnostic output kept for error excerpts
    pub diagnostic_tail_lines: usize,
    /// Capacity of the progress broadcast channel
    pub event_capacity: usize,
}

impl RegistryConfig {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    #[must_use]
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = path.into();
        self
    }

    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            temp_root: std::env::temp_dir().join("quietcut"),
            default_timeout: DEFAULT_TIMEOUT,
            kill_grace: Duration::from_secs(2),
            stale_after: Duration::from_secs(24 * 60 * 60),
            preserve_temp: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            diagnostic_tail_lines: 40,
            event_capacity: 256,
        }
    }
}
