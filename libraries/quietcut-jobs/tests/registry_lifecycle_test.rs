//! Job registry lifecycle tests
//!
//! `/bin/sh` stands in for the media tool so each test can script exactly the
//! diagnostic output, exit status and timing it needs.

#![cfg(unix)]

use quietcut_core::JobId;
use quietcut_jobs::{
    JobRegistry, JobStatus, ProcessErrorKind, ProgressEvent, RegistryConfig, RunRequest,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::broadcast;

// ============================================================================
// Helpers
// ============================================================================

fn registry(root: &Path) -> JobRegistry {
    let config = RegistryConfig::new(root)
        .with_ffmpeg("/bin/sh")
        .with_kill_grace(Duration::from_millis(200));
    JobRegistry::new(config)
}

fn shell(script: &str) -> RunRequest {
    RunRequest::new(["-c", script])
}

/// Collect events until the stream stays quiet for `idle`
async fn collect_events(
    rx: &mut broadcast::Receiver<ProgressEvent>,
    idle: Duration,
) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => break,
        }
    }
    events
}

fn terminal_events<'a>(events: &'a [ProgressEvent], id: &str) -> Vec<&'a ProgressEvent> {
    events
        .iter()
        .filter(|event| event.job_id.as_str() == id && event.status.is_terminal())
        .collect()
}

async fn wait_until_running(registry: &JobRegistry, id: &JobId) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !registry.is_running(id) {
        assert!(Instant::now() < deadline, "job {id} never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Pid written by a script that runs `echo $$ > <path>` first
async fn wait_for_pid(path: &Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(pid) = std::fs::read_to_string(path) {
            let pid = pid.trim().to_string();
            if !pid.is_empty() {
                return pid;
            }
        }
        assert!(Instant::now() < deadline, "pid file {} never written", path.display());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Poll until `pid` has exited, failing once `within` has passed
async fn assert_exits_within(pid: &str, within: Duration) {
    let deadline = Instant::now() + within;
    while process_alive(pid) {
        assert!(Instant::now() < deadline, "process {pid} still alive");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn successful_job_reports_progress_and_output() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let mut rx = registry.subscribe();

    let script = "printf 'Input #0, wav\\n' >&2; \
                  printf 'size=1kB time=00:00:01.00 bitrate=1\\r' >&2; \
                  sleep 0.3; \
                  printf 'size=2kB time=00:00:02.00 bitrate=1\\n' >&2; \
                  echo done";
    let output = registry
        .run(
            shell(script)
                .job_id("ok")
                .expected_duration(Duration::from_secs(4))
                .phase("render"),
        )
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.stdout, "done\n");
    assert!(output.diagnostic_text.contains("Input #0, wav"));
    assert!(output.diagnostic_text.contains("time=00:00:02.00"));
    assert!(!output.diagnostic_text.contains("time=00:00:01.00"));

    let events = collect_events(&mut rx, Duration::from_millis(300)).await;
    let running: Vec<_> = events
        .iter()
        .filter(|e| e.status == JobStatus::Running)
        .collect();
    assert!(!running.is_empty());
    assert_eq!(running[0].percent, Some(25.0));
    assert_eq!(running[0].phase.as_deref(), Some("render"));

    let last = events.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.percent, Some(100.0));
    assert_eq!(terminal_events(&events, "ok").len(), 1);

    assert!(!registry.job_temp_dir(&JobId::new("ok")).exists());
    assert!(!registry.is_running(&JobId::new("ok")));
}

#[tokio::test]
async fn job_without_expected_duration_is_indeterminate() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let mut rx = registry.subscribe();

    registry
        .run(shell("echo 'time=00:00:03.00' >&2").job_id("open-ended"))
        .await
        .unwrap();

    let events = collect_events(&mut rx, Duration::from_millis(300)).await;
    let running = events
        .iter()
        .find(|e| e.status == JobStatus::Running)
        .unwrap();
    assert!(running.indeterminate);
    assert_eq!(running.percent, None);
    assert_eq!(running.position_ms, Some(3_000));
}

#[tokio::test]
async fn job_runs_inside_its_temp_directory() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());

    let output = registry
        .run(shell("echo \"$TMPDIR\"; test -d \"$TMPDIR\"").job_id("scratch"))
        .await
        .unwrap();

    let expected = registry.job_temp_dir(&JobId::new("scratch"));
    assert_eq!(output.stdout.trim(), expected.to_str().unwrap());
    assert!(!expected.exists());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn non_zero_exit_carries_code_and_diagnostic_tail() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let mut rx = registry.subscribe();

    let err = registry
        .run(shell("echo \"Unknown encoder 'libfoo'\" >&2; exit 3").job_id("bad"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProcessErrorKind::NonZeroExit);
    assert_eq!(err.exit_code, Some(3));
    assert!(err.diagnostic_text.contains("Unknown encoder"));

    let events = collect_events(&mut rx, Duration::from_millis(300)).await;
    let terminal = terminal_events(&events, "bad");
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].status, JobStatus::Failed);
    assert!(!registry.job_temp_dir(&JobId::new("bad")).exists());
}

#[tokio::test]
async fn diagnostic_excerpt_is_limited_to_the_tail() {
    let root = TempDir::new().unwrap();
    let mut config = RegistryConfig::new(root.path()).with_ffmpeg("/bin/sh");
    config.diagnostic_tail_lines = 3;
    let registry = JobRegistry::new(config);

    let err = registry
        .run(shell("for i in 1 2 3 4 5 6; do echo \"line $i\" >&2; done; exit 1"))
        .await
        .unwrap_err();

    assert_eq!(err.diagnostic_text, "line 4\nline 5\nline 6");
}

#[tokio::test]
async fn missing_binary_fails_to_spawn() {
    let root = TempDir::new().unwrap();
    let registry = JobRegistry::new(
        RegistryConfig::new(root.path()).with_ffmpeg("/nonexistent/quietcut-media-tool"),
    );
    let mut rx = registry.subscribe();

    let err = registry
        .run(RunRequest::new(["-version"]).job_id("ghost"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProcessErrorKind::SpawnFailed);
    assert!(!err.is_retryable());
    assert!(!registry.job_temp_dir(&JobId::new("ghost")).exists());
    assert!(registry.active_jobs().is_empty());

    let events = collect_events(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn slow_job_times_out() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let started = Instant::now();

    let err = registry
        .run(
            shell("sleep 5")
                .job_id("slow")
                .timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ProcessErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!registry.job_temp_dir(&JobId::new("slow")).exists());
    assert!(!registry.is_running(&JobId::new("slow")));
}

#[tokio::test]
async fn out_of_range_progress_marker_does_not_stall_the_job() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let started = Instant::now();

    let output = registry
        .run(
            shell("echo 'size=1kB time=1e300 bitrate=1' >&2; echo 'time=99999999999999999999:00:00.00' >&2; exit 0")
                .job_id("huge-marker")
                .expected_duration(Duration::from_secs(10))
                .timeout(Duration::from_secs(3)),
        )
        .await
        .unwrap();

    assert!(output.success);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(output.diagnostic_text.contains("time=1e300"));
}

#[tokio::test]
async fn timed_out_process_is_killed_after_grace() {
    let root = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let registry = registry(root.path());
    let pid_file = scratch.path().join("pid");
    let script = format!(
        "echo $$ > '{}'; trap '' TERM; sleep 5",
        pid_file.display()
    );

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry
                .run(
                    shell(&script)
                        .job_id("stubborn-timeout")
                        .timeout(Duration::from_millis(400)),
                )
                .await
        })
    };
    let pid = wait_for_pid(&pid_file).await;
    assert!(process_alive(&pid));

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ProcessErrorKind::Timeout);
    assert_exits_within(&pid, Duration::from_secs(2)).await;
}

// ============================================================================
// Cancellation and cleanup
// ============================================================================

#[tokio::test]
async fn cancelled_process_ignoring_quit_is_killed_after_grace() {
    let root = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let registry = registry(root.path());
    let id = JobId::new("stubborn-cancel");
    let pid_file = scratch.path().join("pid");
    let script = format!(
        "echo $$ > '{}'; trap '' TERM; sleep 5",
        pid_file.display()
    );

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run(shell(&script).job_id("stubborn-cancel")).await })
    };
    wait_until_running(&registry, &id).await;
    let pid = wait_for_pid(&pid_file).await;

    assert!(registry.cancel(&id).await.cancelled);
    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ProcessErrorKind::Cancelled);

    // 200ms grace, then the kill
    assert_exits_within(&pid, Duration::from_secs(2)).await;
}

#[tokio::test]
async fn cancelled_process_honouring_quit_exits_before_grace() {
    let root = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let config = RegistryConfig::new(root.path())
        .with_ffmpeg("/bin/sh")
        .with_kill_grace(Duration::from_secs(10));
    let registry = JobRegistry::new(config);
    let id = JobId::new("polite");
    let pid_file = scratch.path().join("pid");
    let script = format!("echo $$ > '{}'; read cmd; exit 0", pid_file.display());

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run(shell(&script).job_id("polite")).await })
    };
    wait_until_running(&registry, &id).await;
    let pid = wait_for_pid(&pid_file).await;

    assert!(registry.cancel(&id).await.cancelled);
    assert_eq!(
        handle.await.unwrap().unwrap_err().kind,
        ProcessErrorKind::Cancelled
    );
    assert_exits_within(&pid, Duration::from_secs(3)).await;
}

#[tokio::test]
async fn cancel_resolves_running_job() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let id = JobId::new("to-cancel");

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run(shell("sleep 5").job_id("to-cancel")).await })
    };
    wait_until_running(&registry, &id).await;
    assert!(registry.job_temp_dir(&id).exists());

    let outcome = registry.cancel(&id).await;
    assert!(outcome.cancelled);

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ProcessErrorKind::Cancelled);
    assert!(!registry.job_temp_dir(&id).exists());

    let again = registry.cancel(&id).await;
    assert!(!again.cancelled);
}

#[tokio::test]
async fn cancel_unknown_job_is_a_no_op() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());

    let outcome = registry.cancel(&JobId::new("never-started")).await;

    assert!(!outcome.cancelled);
    assert!(outcome.message.contains("never-started"));
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let id = JobId::new("twice");

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run(shell("sleep 5").job_id("twice")).await })
    };
    wait_until_running(&registry, &id).await;

    assert!(registry.cleanup(&id).await);
    assert!(!registry.cleanup(&id).await);
    assert!(!registry.cleanup(&id).await);

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ProcessErrorKind::Cancelled);
}

#[tokio::test]
async fn racing_timeout_and_cancel_resolve_once() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let mut rx = registry.subscribe();
    let id = JobId::new("race");

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move {
            registry
                .run(
                    shell("sleep 5")
                        .job_id("race")
                        .timeout(Duration::from_millis(150)),
                )
                .await
        })
    };
    wait_until_running(&registry, &id).await;
    tokio::time::sleep(Duration::from_millis(140)).await;
    let (cancel, cleanup) = tokio::join!(registry.cancel(&id), registry.cleanup(&id));

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(
        err.kind,
        ProcessErrorKind::Timeout | ProcessErrorKind::Cancelled
    ));
    assert!(!(cancel.cancelled && cleanup));

    let events = collect_events(&mut rx, Duration::from_millis(400)).await;
    assert_eq!(terminal_events(&events, "race").len(), 1);
    let last = events.iter().rev().find(|e| e.job_id == id).unwrap();
    assert!(last.status.is_terminal());
}

#[tokio::test]
async fn shutdown_cancels_everything() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.run(shell("sleep 5").job_id(name)).await })
        })
        .collect();
    for name in ["a", "b"] {
        wait_until_running(&registry, &JobId::new(name)).await;
    }
    assert_eq!(registry.active_jobs().len(), 2);

    registry.shutdown().await;

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind, ProcessErrorKind::Cancelled);
    }
    assert!(registry.active_jobs().is_empty());
}

// ============================================================================
// Temp directories
// ============================================================================

#[tokio::test]
async fn preview_directory_survives_until_the_next_preview() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let first = JobId::new("preview-1");
    let second = JobId::new("preview-2");

    registry
        .run(shell("exit 0").job_id(first.clone()).phase("preview"))
        .await
        .unwrap();
    assert!(registry.job_temp_dir(&first).exists());

    registry
        .run(shell("exit 0").job_id(second.clone()).phase("preview"))
        .await
        .unwrap();
    assert!(!registry.job_temp_dir(&first).exists());
    assert!(registry.job_temp_dir(&second).exists());

    registry.shutdown().await;
    assert!(!registry.job_temp_dir(&second).exists());
}

#[tokio::test]
async fn similar_ids_never_share_a_directory() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    let slashed = JobId::new("a/b");
    let underscored = JobId::new("a_b");
    assert_ne!(
        registry.job_temp_dir(&slashed),
        registry.job_temp_dir(&underscored)
    );
    assert_eq!(
        registry.job_temp_dir(&slashed).parent(),
        Some(root.path())
    );

    let handle = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.run(shell("sleep 5").job_id("a/b")).await })
    };
    wait_until_running(&registry, &slashed).await;

    registry
        .run(shell("exit 0").job_id(underscored.clone()))
        .await
        .unwrap();

    assert!(registry.is_running(&slashed));
    assert!(registry.job_temp_dir(&slashed).exists());
    assert!(!registry.job_temp_dir(&underscored).exists());

    registry.cancel(&slashed).await;
    assert_eq!(
        handle.await.unwrap().unwrap_err().kind,
        ProcessErrorKind::Cancelled
    );
}

#[tokio::test]
async fn stale_sweep_removes_only_job_directories() {
    let root = TempDir::new().unwrap();
    let registry = registry(root.path());
    std::fs::create_dir_all(root.path().join("job-leftover")).unwrap();
    std::fs::create_dir_all(root.path().join("unrelated")).unwrap();

    let removed = registry
        .sweep_stale_older_than(Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(!root.path().join("job-leftover").exists());
    assert!(root.path().join("unrelated").exists());
}

#[tokio::test]
async fn stale_sweep_respects_preserve_flag_and_age() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("job-leftover")).unwrap();

    let mut config = RegistryConfig::new(root.path()).with_ffmpeg("/bin/sh");
    config.preserve_temp = true;
    let preserving = JobRegistry::new(config);
    assert_eq!(preserving.sweep_stale_older_than(Duration::ZERO).await.unwrap(), 0);
    assert!(root.path().join("job-leftover").exists());

    // Fresh directories are younger than the default day-long threshold
    let sweeping = registry(root.path());
    assert_eq!(sweeping.sweep_stale().await.unwrap(), 0);
    assert!(root.path().join("job-leftover").exists());
}

#[tokio::test]
async fn registries_are_independent() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();
    let a = registry(root_a.path());
    let b = registry(root_b.path());
    let id = JobId::new("shared-name");

    let handle = {
        let a = a.clone();
        tokio::spawn(async move { a.run(shell("sleep 5").job_id("shared-name")).await })
    };
    wait_until_running(&a, &id).await;

    assert!(!b.is_running(&id));
    assert!(!b.cancel(&id).await.cancelled);
    assert!(a.cancel(&id).await.cancelled);
    assert_eq!(
        handle.await.unwrap().unwrap_err().kind,
        ProcessErrorKind::Cancelled
    );
}
