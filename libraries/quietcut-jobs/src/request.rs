/// Run requests and results
use quietcut_core::JobId;
use std::time::Duration;

/// Phase label marking preview renders, whose temp directories outlive the job
pub const PREVIEW_PHASE: &str = "preview";

/// Which binary a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// The media-processing binary
    #[default]
    Media,
    /// The companion probe binary
    Probe,
}

/// One process invocation
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub tool: Tool,
    pub args: Vec<String>,
    /// Falls back to the registry default when unset
    pub timeout: Option<Duration>,
    /// Media duration the job will cover; enables percent progress
    pub expected_duration: Option<Duration>,
    pub phase: Option<String>,
    /// Generated when unset
    pub job_id: Option<JobId>,
}

impl RunRequest {
    /// Run the media binary with `args`
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Run the probe binary with `args`
    pub fn probe<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool: Tool::Probe,
            ..Self::new(args)
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn expected_duration(mut self, duration: Duration) -> Self {
        self.expected_duration = Some(duration);
        self
    }

    #[must_use]
    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    #[must_use]
    pub fn job_id(mut self, id: impl Into<JobId>) -> Self {
        self.job_id = Some(id.into());
        self
    }

    pub fn is_preview(&self) -> bool {
        is_preview_phase(self.phase.as_deref())
    }
}

pub(crate) fn is_preview_phase(phase: Option<&str>) -> bool {
    phase.is_some_and(|p| p.starts_with(PREVIEW_PHASE))
}

/// Successful completion of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub job_id: JobId,
    pub success: bool,
    /// Retained diagnostic stream (status lines collapsed to the last one)
    pub diagnostic_text: String,
    pub stdout: String,
    pub elapsed: Duration,
}
