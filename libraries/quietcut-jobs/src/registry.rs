//! Job registry and lifecycle controller
//!
//! Every spawned process is tracked as a `Job` keyed by its `JobId`. A job
//! leaves the registry through exactly one path, `Inner::finish`, whichever of
//! process exit, timeout, cancellation or explicit cleanup gets there first.
//! Removing the entry from the map is the latch: only the caller that removes
//! it resolves the pending `run`, publishes the terminal event and releases
//! the job's temp directory. Later callers find nothing and do nothing.

use crate::config::RegistryConfig;
use crate::diagnostics::{DiagnosticLog, LineSplitter};
use crate::error::{ProcessError, Result};
use crate::progress::{JobStatus, ProgressEmitter, ProgressEvent, ProgressUpdate};
use crate::request::{is_preview_phase, RunOutput, RunRequest, Tool};
use crate::runner::JobRunner;
use async_trait::async_trait;
use parking_lot::Mutex;
use quietcut_core::JobId;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Prefix of every job directory under the temp root
const JOB_DIR_PREFIX: &str = "job-";

/// A running process owned by the registry
struct Job {
    started_at: Instant,
    timeout_after: Duration,
    expected_duration: Option<Duration>,
    phase: Option<String>,
    temp_dir: PathBuf,
    program: String,
    /// Tells the supervisor to stop the child
    stop: CancellationToken,
    timer: JoinHandle<()>,
    diagnostics: Arc<Mutex<DiagnosticLog>>,
    progress: mpsc::UnboundedSender<ProgressUpdate>,
    resolver: oneshot::Sender<Result<RunOutput>>,
}

/// How a job reached its terminal state
enum Terminal {
    Exited {
        status: io::Result<ExitStatus>,
        stdout: String,
    },
    TimedOut,
    Cancelled(String),
}

/// Result of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    /// False when no job with that id was running
    pub cancelled: bool,
    pub message: String,
}

/// Point-in-time view of a running job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub phase: Option<String>,
    pub elapsed: Duration,
    pub expected_duration: Option<Duration>,
    pub temp_dir: PathBuf,
}

struct Inner {
    config: RegistryConfig,
    jobs: Mutex<HashMap<JobId, Job>>,
    events: broadcast::Sender<ProgressEvent>,
    /// Directory of the most recent preview render
    preview_dir: Mutex<Option<PathBuf>>,
}

/// Owns and supervises every process launched through it
///
/// Cheap to clone; clones share the same registry. Independent registries do
/// not share any state.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                jobs: Mutex::new(HashMap::new()),
                events,
                preview_dir: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Subscribe to progress events from every job
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    /// Directory a job with this id uses for intermediates
    pub fn job_temp_dir(&self, id: &JobId) -> PathBuf {
        self.inner.job_temp_dir(id)
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.inner.jobs.lock().contains_key(id)
    }

    /// Snapshot of every running job
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        self.inner
            .jobs
            .lock()
            .iter()
            .map(|(id, job)| JobSnapshot {
                job_id: id.clone(),
                phase: job.phase.clone(),
                elapsed: job.started_at.elapsed(),
                expected_duration: job.expected_duration,
                temp_dir: job.temp_dir.clone(),
            })
            .collect()
    }

    /// Spawn one process and wait for it to reach a terminal state
    pub async fn run(&self, request: RunRequest) -> Result<RunOutput> {
        let inner = &self.inner;
        let id = request.job_id.clone().unwrap_or_else(JobId::generate);
        let timeout = request.timeout.unwrap_or(inner.config.default_timeout);
        let program = match request.tool {
            Tool::Media => inner.config.ffmpeg_path.clone(),
            Tool::Probe => inner.config.ffprobe_path.clone(),
        };
        let program_name = program.display().to_string();
        let mut emitter = ProgressEmitter::new(
            id.clone(),
            request.expected_duration,
            request.phase.clone(),
            inner.config.progress_interval,
            inner.events.clone(),
        );

        if inner.jobs.lock().contains_key(&id) {
            return Err(ProcessError::spawn_failed(format!(
                "Job {} is already running",
                id
            )));
        }

        let temp_dir = inner.job_temp_dir(&id);
        if let Err(e) = tokio::fs::create_dir_all(&temp_dir).await {
            emitter.emit_terminal(JobStatus::Failed, None);
            return Err(ProcessError::spawn_failed(format!(
                "Failed to create job directory {}: {}",
                temp_dir.display(),
                e
            )));
        }
        if request.is_preview() {
            inner.replace_preview_dir(&temp_dir).await;
        }

        let mut command = Command::new(&program);
        command
            .args(&request.args)
            .env("TMPDIR", &temp_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Running {} {:?}", program_name, request.args);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to spawn {} for job {}: {}", program_name, id, e);
                if !request.is_preview() {
                    remove_dir_quietly(&temp_dir).await;
                }
                emitter.emit_terminal(JobStatus::Failed, None);
                return Err(ProcessError::spawn_failed(format!(
                    "Failed to spawn {}: {}",
                    program_name, e
                )));
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (resolver, resolved) = oneshot::channel();
        let (progress, updates) = mpsc::unbounded_channel();
        tokio::spawn(emitter.forward(updates));

        let stop = CancellationToken::new();
        let diagnostics = Arc::new(Mutex::new(DiagnosticLog::new()));

        {
            let mut jobs = inner.jobs.lock();
            if jobs.contains_key(&id) {
                drop(jobs);
                // Lost a race with another run using the same id; kill_on_drop reaps the child
                drop(child);
                return Err(ProcessError::spawn_failed(format!(
                    "Job {} is already running",
                    id
                )));
            }

            let timer = {
                let inner = Arc::clone(inner);
                let id = id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    tracing::warn!("Job {} exceeded its {:?} budget", id, timeout);
                    inner.finish(&id, Terminal::TimedOut).await;
                })
            };

            jobs.insert(
                id.clone(),
                Job {
                    started_at: Instant::now(),
                    timeout_after: timeout,
                    expected_duration: request.expected_duration,
                    phase: request.phase.clone(),
                    temp_dir,
                    program: program_name.clone(),
                    stop: stop.clone(),
                    timer,
                    diagnostics: Arc::clone(&diagnostics),
                    progress: progress.clone(),
                    resolver,
                },
            );
        }

        tracing::info!(
            "Started job {} ({}, phase {})",
            id,
            program_name,
            request.phase.as_deref().unwrap_or("none")
        );

        tokio::spawn(supervise(
            Arc::clone(inner),
            id.clone(),
            child,
            stdin,
            stdout,
            stderr,
            stop,
            diagnostics,
            progress,
        ));

        match resolved.await {
            Ok(result) => result,
            Err(_) => Err(ProcessError::cancelled(format!(
                "Job {} was dropped before it resolved",
                id
            ))),
        }
    }

    /// Cancel a running job
    ///
    /// Unknown ids are not an error; the outcome says nothing was running.
    pub async fn cancel(&self, id: &JobId) -> CancelOutcome {
        let reason = format!("Job {} cancelled", id);
        if self.inner.finish(id, Terminal::Cancelled(reason)).await {
            tracing::info!("Cancelled job {}", id);
            CancelOutcome {
                cancelled: true,
                message: format!("Cancelled job {}", id),
            }
        } else {
            tracing::debug!("Cancel requested for unknown job {}", id);
            CancelOutcome {
                cancelled: false,
                message: format!("No running job with id {}", id),
            }
        }
    }

    /// Stop and deregister a job; returns false if it was already gone
    ///
    /// Idempotent: only the first call for a job has any effect.
    pub async fn cleanup(&self, id: &JobId) -> bool {
        let reason = format!("Job {} cleaned up", id);
        self.inner.finish(id, Terminal::Cancelled(reason)).await
    }

    /// Cancel every running job and drop the retained preview directory
    pub async fn shutdown(&self) {
        let ids: Vec<JobId> = self.inner.jobs.lock().keys().cloned().collect();
        for id in ids {
            let reason = format!("Job {} stopped at shutdown", id);
            self.inner.finish(&id, Terminal::Cancelled(reason)).await;
        }
        let preview = self.inner.preview_dir.lock().take();
        if let Some(dir) = preview {
            remove_dir_quietly(&dir).await;
        }
        tracing::info!("Job registry shut down");
    }

    /// Remove job directories older than the configured age
    pub async fn sweep_stale(&self) -> io::Result<usize> {
        self.sweep_stale_older_than(self.inner.config.stale_after)
            .await
    }

    /// Remove job directories older than `max_age`
    ///
    /// Does nothing when `preserve_temp` is set. Directories of running jobs
    /// are never touched.
    pub async fn sweep_stale_older_than(&self, max_age: Duration) -> io::Result<usize> {
        let config = &self.inner.config;
        if config.preserve_temp {
            tracing::info!("Temp preservation enabled, skipping stale sweep");
            return Ok(0);
        }

        let live: HashSet<PathBuf> = self
            .inner
            .jobs
            .lock()
            .values()
            .map(|job| job.temp_dir.clone())
            .collect();

        let mut entries = match tokio::fs::read_dir(&config.temp_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_job_dir = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(JOB_DIR_PREFIX));
            if !is_job_dir || !entry.file_type().await?.is_dir() || live.contains(&path) {
                continue;
            }

            let modified = entry.metadata().await?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::debug!("Removed stale job directory {}", path.display());
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to remove stale directory {}: {}", path.display(), e);
                }
            }
        }

        if removed > 0 {
            tracing::info!("Stale sweep removed {} job directories", removed);
        }
        Ok(removed)
    }
}

#[async_trait]
impl JobRunner for JobRegistry {
    async fn run(&self, request: RunRequest) -> Result<RunOutput> {
        JobRegistry::run(self, request).await
    }
}

impl Inner {
    /// Directory names are injective in the id: `_` introduces a hex escape
    fn job_temp_dir(&self, id: &JobId) -> PathBuf {
        let mut safe = String::with_capacity(id.as_str().len());
        for byte in id.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{:02x}", byte));
            }
        }
        self.config
            .temp_root
            .join(format!("{}{}", JOB_DIR_PREFIX, safe))
    }

    /// Record a new preview directory, removing the previous one
    async fn replace_preview_dir(&self, dir: &Path) {
        let previous = self.preview_dir.lock().replace(dir.to_path_buf());
        let Some(previous) = previous else { return };
        if previous == dir {
            return;
        }
        let still_running = self
            .jobs
            .lock()
            .values()
            .any(|job| job.temp_dir == previous);
        if !still_running {
            remove_dir_quietly(&previous).await;
        }
    }

    /// The single terminal path for a job
    ///
    /// Returns false when the job had already left the registry.
    async fn finish(&self, id: &JobId, terminal: Terminal) -> bool {
        let Some(job) = self.jobs.lock().remove(id) else {
            return false;
        };

        // The timer task calls in here itself and must not abort its own future
        if !matches!(terminal, Terminal::TimedOut) {
            job.timer.abort();
        }
        job.stop.cancel();

        let elapsed = job.started_at.elapsed();
        let tail_lines = self.config.diagnostic_tail_lines;
        let (result, status) = {
            let log = job.diagnostics.lock();
            match terminal {
                Terminal::Exited {
                    status: Ok(status),
                    stdout,
                } if status.success() => (
                    Ok(RunOutput {
                        job_id: id.clone(),
                        success: true,
                        diagnostic_text: log.full_text(),
                        stdout,
                        elapsed,
                    }),
                    JobStatus::Completed,
                ),
                Terminal::Exited {
                    status: Ok(status), ..
                } => (
                    Err(ProcessError::non_zero_exit(
                        format!("{} failed with {}", job.program, status),
                        status.code(),
                    )
                    .with_diagnostics(log.tail(tail_lines))),
                    JobStatus::Failed,
                ),
                Terminal::Exited { status: Err(e), .. } => (
                    Err(ProcessError::non_zero_exit(
                        format!("Failed to wait for {}: {}", job.program, e),
                        None,
                    )
                    .with_diagnostics(log.tail(tail_lines))),
                    JobStatus::Failed,
                ),
                Terminal::TimedOut => (
                    Err(ProcessError::timeout(format!(
                        "Job {} timed out after {:?}",
                        id, job.timeout_after
                    ))
                    .with_diagnostics(log.tail(tail_lines))),
                    JobStatus::TimedOut,
                ),
                Terminal::Cancelled(reason) => (
                    Err(ProcessError::cancelled(reason).with_diagnostics(log.tail(tail_lines))),
                    JobStatus::Cancelled,
                ),
            }
        };

        let percent = (status == JobStatus::Completed).then_some(100.0);
        let _ = job.progress.send(ProgressUpdate::Terminal { status, percent });

        if is_preview_phase(job.phase.as_deref()) {
            tracing::debug!("Keeping preview directory {}", job.temp_dir.display());
        } else {
            remove_dir_quietly(&job.temp_dir).await;
        }

        tracing::info!("Job {} finished: {:?} after {:?}", id, status, elapsed);
        let _ = job.resolver.send(result);
        true
    }
}

/// Drive one child until it exits or the registry asks it to stop
#[allow(clippy::too_many_arguments)]
async fn supervise(
    inner: Arc<Inner>,
    id: JobId,
    mut child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stop: CancellationToken,
    diagnostics: Arc<Mutex<DiagnosticLog>>,
    progress: mpsc::UnboundedSender<ProgressUpdate>,
) {
    let exited = {
        let wait = async {
            let (_, stdout_text, status) = tokio::join!(
                drain_diagnostics(stderr, &diagnostics, &progress),
                read_stdout(stdout),
                child.wait()
            );
            (status, stdout_text)
        };
        tokio::select! {
            (status, stdout_text) = wait => Some((status, stdout_text)),
            () = stop.cancelled() => None,
        }
    };

    match exited {
        Some((status, stdout)) => {
            inner.finish(&id, Terminal::Exited { status, stdout }).await;
        }
        None => terminate(&mut child, stdin, inner.config.kill_grace, &id).await,
    }
}

/// Read stderr line by line, recording diagnostics and forwarding positions
async fn drain_diagnostics(
    stderr: Option<ChildStderr>,
    diagnostics: &Mutex<DiagnosticLog>,
    progress: &mpsc::UnboundedSender<ProgressUpdate>,
) {
    let Some(mut stderr) = stderr else { return };
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; 8 * 1024];

    let record = |line: String| {
        let position = diagnostics.lock().record(line);
        if let Some(position) = position {
            let _ = progress.send(ProgressUpdate::Position(position));
        }
    };

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    record(line);
                }
            }
            Err(e) => {
                tracing::debug!("Diagnostic stream closed with error: {}", e);
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        record(line);
    }
}

async fn read_stdout(stdout: Option<ChildStdout>) -> String {
    let Some(mut stdout) = stdout else {
        return String::new();
    };
    let mut bytes = Vec::new();
    if let Err(e) = stdout.read_to_end(&mut bytes).await {
        tracing::debug!("Failed to read stdout: {}", e);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Ask the tool to quit, then kill it if it has not exited within `grace`
async fn terminate(child: &mut Child, stdin: Option<ChildStdin>, grace: Duration, id: &JobId) {
    if let Some(mut stdin) = stdin {
        // `q` on stdin makes the media tool finalize and exit
        let _ = stdin.write_all(b"q\n").await;
        let _ = stdin.flush().await;
        drop(stdin);

        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            tracing::debug!("Job {} stopped: {:?}", id, status);
            return;
        }
    }

    tracing::warn!("Job {} ignored the stop request, killing", id);
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill job {}: {}", id, e);
    }
}

async fn remove_dir_quietly(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
