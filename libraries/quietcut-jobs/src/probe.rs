//! Media duration probing

use crate::error::{ProcessError, Result};
use crate::request::RunRequest;
use crate::runner::JobRunner;
use std::time::Duration;

/// Probes are short; they never get the full render budget
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Duration of `input` as reported by the probe binary
pub async fn probe_duration<R: JobRunner + ?Sized>(runner: &R, input: &str) -> Result<Duration> {
    let request = RunRequest::probe([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        input,
    ])
    .timeout(PROBE_TIMEOUT)
    .phase("probe");

    let output = runner.run(request).await?;
    parse_duration(&output.stdout).ok_or_else(|| {
        ProcessError::non_zero_exit(
            format!("Probe reported no usable duration for {}", input),
            None,
        )
        .with_diagnostics(output.stdout.trim())
    })
}

/// First line holding a positive number of seconds
fn parse_duration(stdout: &str) -> Option<Duration> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .find_map(|secs| Duration::try_from_secs_f64(secs).ok())
}
