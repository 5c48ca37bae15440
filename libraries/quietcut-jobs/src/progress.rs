//! Progress events
//!
//! Each job owns an ordered channel of raw progress updates. A forwarding
//! task per job drains it, applies the throttle and publishes the surviving
//! events on the registry's broadcast stream:
//! - position updates: at most one per `progress_interval` per job
//! - terminal updates: never throttled, exactly one per job, and nothing
//!   from that job is published after it

use quietcut_core::JobId;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};

/// Lifecycle status carried by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Event published to progress subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Percent complete (0-100) when the expected duration is known
    pub percent: Option<f32>,
    /// Set when no expected duration was given
    pub indeterminate: bool,
    pub position_ms: Option<u64>,
    pub phase: Option<String>,
}

/// Raw update pushed by the supervisor and the terminal path
#[derive(Debug, Clone, Copy)]
pub(crate) enum ProgressUpdate {
    Position(Duration),
    Terminal {
        status: JobStatus,
        percent: Option<f32>,
    },
}

/// Per-job rate limiter for position updates
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Whether an update arriving at `now` may be published
    pub fn admit(&mut self, now: Instant) -> bool {
        let due = self
            .last_emit
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_emit = Some(now);
        }
        due
    }
}

/// Percent complete, clamped to 0-100
pub fn percent_complete(position: Duration, expected: Duration) -> Option<f32> {
    if expected.is_zero() {
        return None;
    }
    let ratio = position.as_secs_f64() / expected.as_secs_f64();
    Some((ratio * 100.0).clamp(0.0, 100.0) as f32)
}

/// Publishing side for one job
pub(crate) struct ProgressEmitter {
    job_id: JobId,
    expected_duration: Option<Duration>,
    phase: Option<String>,
    throttle: ProgressThrottle,
    events: broadcast::Sender<ProgressEvent>,
}

impl ProgressEmitter {
    pub(crate) fn new(
        job_id: JobId,
        expected_duration: Option<Duration>,
        phase: Option<String>,
        interval: Duration,
        events: broadcast::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            job_id,
            expected_duration,
            phase,
            throttle: ProgressThrottle::new(interval),
            events,
        }
    }

    /// Throttled position update
    pub(crate) fn emit(&mut self, position: Duration) {
        if !self.throttle.admit(Instant::now()) {
            return;
        }
        let percent = self
            .expected_duration
            .and_then(|expected| percent_complete(position, expected));
        self.publish(JobStatus::Running, percent, Some(position));
    }

    /// Terminal update, bypasses the throttle
    pub(crate) fn emit_terminal(&mut self, status: JobStatus, percent: Option<f32>) {
        self.publish(status, percent, None);
    }

    fn publish(&self, status: JobStatus, percent: Option<f32>, position: Option<Duration>) {
        let event = ProgressEvent {
            job_id: self.job_id.clone(),
            status,
            percent,
            indeterminate: self.expected_duration.is_none(),
            position_ms: position.map(|p| p.as_millis() as u64),
            phase: self.phase.clone(),
        };
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Drain one job's updates until its terminal update arrives
    pub(crate) async fn forward(mut self, mut updates: mpsc::UnboundedReceiver<ProgressUpdate>) {
        while let Some(update) = updates.recv().await {
            match update {
                ProgressUpdate::Position(position) => self.emit(position),
                ProgressUpdate::Terminal { status, percent } => {
                    self.emit_terminal(status, percent);
                    return;
                }
            }
        }
    }
}
