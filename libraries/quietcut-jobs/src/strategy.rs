//! Render strategy orchestration
//!
//! A render is attempted with an ordered list of strategies, cheapest first
//! (stream copy, then re-encode, then a last-resort encoder). Only a
//! tool-reported failure moves on to the next strategy; anything else would
//! fail the same way again and aborts the sequence.

use crate::diagnostics::truncate_tail;
use crate::error::{ProcessError, ProcessErrorKind};
use crate::request::RunRequest;
use crate::runner::JobRunner;
use quietcut_core::JobId;
use quietcut_filters::{compile_filters, FilterStage};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Characters of diagnostic text kept per failed attempt
const ATTEMPT_EXCERPT_CHARS: usize = 500;

/// Named way of producing the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStrategy {
    /// Stream copy, no decoding
    Copy,
    /// Decode and encode with the preferred codec
    Reencode,
    /// Most permissive encoder settings
    LastResort,
}

impl RenderStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Reencode => "reencode",
            Self::LastResort => "last_resort",
        }
    }

    /// Whether the filter graph applies to this strategy
    ///
    /// Stream copy never decodes, so there is nothing to filter.
    pub fn accepts_filters(&self) -> bool {
        !matches!(self, Self::Copy)
    }
}

impl fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy and the argument vector that implements it
///
/// The last argument is the output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderAttempt {
    pub strategy: RenderStrategy,
    pub args: Vec<String>,
}

impl RenderAttempt {
    pub fn new(strategy: RenderStrategy, args: Vec<String>) -> Self {
        Self { strategy, args }
    }
}

/// Settings shared by every attempt of one render
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Human-readable name of the render, used in errors
    pub label: String,
    pub timeout: Option<Duration>,
    pub expected_duration: Option<Duration>,
    pub phase: Option<String>,
    /// Base id; attempts run as `<id>-<strategy>`
    pub job_id: Option<JobId>,
    /// Stages inserted as `-af` for strategies that decode
    pub filters: Vec<FilterStage>,
    /// Raw filters appended after the compiled stages, e.g. a loudness gain
    pub post_chain: Option<String>,
}

impl RenderContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
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

    #[must_use]
    pub fn filters(mut self, filters: Vec<FilterStage>) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn post_chain(mut self, chain: impl Into<String>) -> Self {
        self.post_chain = Some(chain.into());
        self
    }

    /// Filter graph handed to strategies that decode
    pub fn filter_graph(&self) -> String {
        let compiled = compile_filters(&self.filters);
        let post = self
            .post_chain
            .as_deref()
            .map(|chain| chain.trim().trim_matches(','))
            .unwrap_or("");
        match (compiled.is_empty(), post.is_empty()) {
            (_, true) => compiled,
            (true, false) => post.to_string(),
            (false, false) => format!("{},{}", compiled, post),
        }
    }
}

/// Record of one failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    pub strategy: RenderStrategy,
    pub message: String,
    /// Tail of the attempt's diagnostic excerpt
    pub diagnostic_excerpt: String,
    /// Known cause found in this attempt's full diagnostics
    pub diagnosis: Option<String>,
}

/// A render that produced nothing
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("No render strategies were supplied")]
    NoAttempts,

    /// An error no other strategy could fix
    #[error("{strategy} attempt aborted: {source}")]
    Aborted {
        strategy: RenderStrategy,
        #[source]
        source: ProcessError,
    },

    #[error("{context} failed after trying {}{}", strategy_list(.failures), diagnosis_suffix(.diagnosis))]
    Exhausted {
        context: String,
        failures: Vec<AttemptFailure>,
        diagnosis: Option<String>,
    },
}

impl RenderError {
    /// Kind of the process error that ended the render, if one did
    pub fn process_kind(&self) -> Option<ProcessErrorKind> {
        match self {
            Self::Aborted { source, .. } => Some(source.kind),
            Self::Exhausted { .. } => Some(ProcessErrorKind::NonZeroExit),
            Self::NoAttempts => None,
        }
    }
}

fn strategy_list(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.strategy.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn diagnosis_suffix(diagnosis: &Option<String>) -> String {
    diagnosis
        .as_ref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// Successful render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSuccess {
    pub strategy: RenderStrategy,
    pub job_id: JobId,
    pub elapsed: Duration,
    /// Attempts that failed before this one
    pub failures: Vec<AttemptFailure>,
}

/// Whether a failure of this kind should move on to the next strategy
pub fn should_escalate(kind: ProcessErrorKind) -> bool {
    kind.is_retryable()
}

/// Known failure signatures, checked in order
const DIAGNOSES: &[(&[&str], &str)] = &[
    (
        &["Unknown encoder", "Encoder not found"],
        "required encoder is not available",
    ),
    (
        &["Invalid data found when processing input", "moov atom not found"],
        "input file is corrupt or truncated",
    ),
    (&["Permission denied"], "permission denied"),
    (&["No space left on device"], "disk is full"),
    (
        &["not currently supported in container", "Could not find tag for codec"],
        "codec is not supported by the output container",
    ),
    (
        &["Unrecognized option", "Option not found", "Invalid argument"],
        "invalid argument passed to the media tool",
    ),
];

/// Short explanation for a known failure signature in the diagnostic text
pub fn diagnose_failure(diagnostic_text: &str) -> Option<&'static str> {
    DIAGNOSES.iter().find_map(|(needles, diagnosis)| {
        needles
            .iter()
            .any(|needle| diagnostic_text.contains(needle))
            .then_some(*diagnosis)
    })
}

/// Insert `-af <graph>` before the output path
fn with_filter_graph(mut args: Vec<String>, graph: &str) -> Vec<String> {
    if graph.is_empty() {
        return args;
    }
    let at = args.len().saturating_sub(1);
    args.splice(at..at, ["-af".to_string(), graph.to_string()]);
    args
}

/// Run attempts in order until one succeeds
///
/// A `NON_ZERO_EXIT` failure is recorded and the next attempt runs. Any
/// other failure stops immediately. When every attempt fails the error lists
/// all of them.
pub async fn try_strategies<R: JobRunner + ?Sized>(
    runner: &R,
    attempts: Vec<RenderAttempt>,
    context: &RenderContext,
) -> Result<RenderSuccess, RenderError> {
    if attempts.is_empty() {
        return Err(RenderError::NoAttempts);
    }

    let graph = context.filter_graph();
    let mut failures: Vec<AttemptFailure> = Vec::new();

    for attempt in attempts {
        let strategy = attempt.strategy;
        let args = if strategy.accepts_filters() {
            with_filter_graph(attempt.args, &graph)
        } else {
            attempt.args
        };

        let mut request = RunRequest::new(args);
        request.timeout = context.timeout;
        request.expected_duration = context.expected_duration;
        request.phase = context.phase.clone();
        request.job_id = context
            .job_id
            .as_ref()
            .map(|id| JobId::new(format!("{}-{}", id, strategy)));

        tracing::info!("{}: trying {} strategy", context.label, strategy);

        match runner.run(request).await {
            Ok(output) => {
                if !failures.is_empty() {
                    tracing::info!(
                        "{}: {} strategy succeeded after {} failed attempts",
                        context.label,
                        strategy,
                        failures.len()
                    );
                }
                return Ok(RenderSuccess {
                    strategy,
                    job_id: output.job_id,
                    elapsed: output.elapsed,
                    failures,
                });
            }
            Err(err) if should_escalate(err.kind) => {
                tracing::warn!("{}: {} strategy failed: {}", context.label, strategy, err);
                failures.push(AttemptFailure {
                    strategy,
                    message: err.message.clone(),
                    diagnostic_excerpt: truncate_tail(&err.diagnostic_text, ATTEMPT_EXCERPT_CHARS),
                    diagnosis: diagnose_failure(&err.diagnostic_text).map(str::to_string),
                });
            }
            Err(err) => {
                tracing::warn!(
                    "{}: {} strategy aborted the render: {}",
                    context.label,
                    strategy,
                    err
                );
                return Err(RenderError::Aborted {
                    strategy,
                    source: err,
                });
            }
        }
    }

    // Earliest recognised cause wins
    let diagnosis = failures.iter().find_map(|failure| failure.diagnosis.clone());
    tracing::error!(
        "{}: every strategy failed ({})",
        context.label,
        strategy_list(&failures)
    );
    Err(RenderError::Exhausted {
        context: context.label.clone(),
        failures,
        diagnosis,
    })
}
