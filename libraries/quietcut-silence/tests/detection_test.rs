//! Quiet region detection through a scripted runner

use async_trait::async_trait;
use quietcut_core::{JobId, QuietCandidate};
use quietcut_jobs::{JobRunner, ProcessError, RunOutput, RunRequest};
use quietcut_silence::{
    DetectionError, QuietDetectionSettings, QuietRegionDetector, SILENCE_PHASE, VOLUME_PHASE,
};
use std::sync::Mutex;
use std::time::Duration;

const VOLUME_OUTPUT: &str = "[Parsed_volumedetect_0 @ 0x1] mean_volume: -30.0 dB\n\
                             [Parsed_volumedetect_0 @ 0x1] max_volume: -3.5 dB";

const SILENCE_OUTPUT: &str = "[silencedetect @ 0x2] silence_start: 1\n\
                              [silencedetect @ 0x2] silence_end: 2 | silence_duration: 1\n\
                              [silencedetect @ 0x2] silence_start: 5\n\
                              [silencedetect @ 0x2] silence_end: 8 | silence_duration: 3\n\
                              [silencedetect @ 0x2] silence_start: 10\n\
                              [silencedetect @ 0x2] silence_end: 12 | silence_duration: 2\n\
                              [silencedetect @ 0x2] silence_start: 14.5";

/// Replies per pass, keyed by the request's phase
struct TwoPassRunner {
    volume: Result<&'static str, ProcessError>,
    silence: Result<&'static str, ProcessError>,
    seen: Mutex<Vec<RunRequest>>,
}

impl TwoPassRunner {
    fn new(
        volume: Result<&'static str, ProcessError>,
        silence: Result<&'static str, ProcessError>,
    ) -> Self {
        Self {
            volume,
            silence,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn phases(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.phase.clone())
            .collect()
    }
}

#[async_trait]
impl JobRunner for TwoPassRunner {
    async fn run(&self, request: RunRequest) -> quietcut_jobs::Result<RunOutput> {
        let reply = match request.phase.as_deref() {
            Some(VOLUME_PHASE) => self.volume.clone(),
            Some(SILENCE_PHASE) => self.silence.clone(),
            other => panic!("unexpected phase {other:?}"),
        };
        self.seen.lock().unwrap().push(request);
        reply.map(|text| RunOutput {
            job_id: JobId::new("scripted"),
            success: true,
            diagnostic_text: text.to_string(),
            stdout: String::new(),
            elapsed: Duration::from_millis(3),
        })
    }
}

fn candidate(start_ms: u64, end_ms: u64) -> QuietCandidate {
    QuietCandidate::new(start_ms, end_ms).unwrap()
}

#[tokio::test]
async fn adaptive_detection_uses_mean_volume_threshold() {
    let runner = TwoPassRunner::new(Ok(VOLUME_OUTPUT), Ok(SILENCE_OUTPUT));
    let detector = QuietRegionDetector::default();

    let detection = detector
        .try_detect(&runner, "talk.wav", Some(Duration::from_secs(20)))
        .await
        .unwrap();

    assert_eq!(detection.threshold_db, -42.0);
    assert_eq!(detection.volume.unwrap().max_volume_db, Some(-3.5));
    assert_eq!(
        detection.candidates,
        vec![
            candidate(5_000, 8_000),
            candidate(10_000, 12_000),
            candidate(1_000, 2_000)
        ]
    );

    let seen = runner.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[1]
        .args
        .contains(&"silencedetect=noise=-42.0dB:d=0.5".to_string()));
    assert_eq!(seen[1].expected_duration, Some(Duration::from_secs(20)));
}

#[tokio::test]
async fn permissive_mode_skips_volume_pass() {
    let runner = TwoPassRunner::new(
        Err(ProcessError::non_zero_exit("should not run", Some(1))),
        Ok(SILENCE_OUTPUT),
    );
    let detector = QuietRegionDetector::new(QuietDetectionSettings::permissive());

    let detection = detector.try_detect(&runner, "talk.wav", None).await.unwrap();

    assert_eq!(detection.volume, None);
    assert_eq!(detection.threshold_db, -20.0);
    assert_eq!(detection.candidates.len(), 3);
    assert_eq!(runner.phases(), vec![SILENCE_PHASE]);
}

#[tokio::test]
async fn candidate_count_is_capped() {
    let runner = TwoPassRunner::new(Ok(VOLUME_OUTPUT), Ok(SILENCE_OUTPUT));
    let detector = QuietRegionDetector::new(QuietDetectionSettings {
        max_candidates: 1,
        ..QuietDetectionSettings::default()
    });

    let candidates = detector.detect(&runner, "talk.wav", None).await;

    assert_eq!(candidates, vec![candidate(5_000, 8_000)]);
}

#[tokio::test]
async fn failed_volume_pass_degrades_to_empty() {
    let runner = TwoPassRunner::new(
        Err(ProcessError::non_zero_exit("volume pass failed", Some(1))),
        Ok(SILENCE_OUTPUT),
    );
    let detector = QuietRegionDetector::default();

    assert!(detector.detect(&runner, "talk.wav", None).await.is_empty());
    assert_eq!(runner.phases(), vec![VOLUME_PHASE]);
}

#[tokio::test]
async fn missing_mean_volume_degrades_to_empty() {
    let runner = TwoPassRunner::new(Ok("Input #0, wav"), Ok(SILENCE_OUTPUT));
    let detector = QuietRegionDetector::default();

    let err = detector
        .try_detect(&runner, "talk.wav", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::MissingVolume));
    assert!(detector.detect(&runner, "talk.wav", None).await.is_empty());
}

#[tokio::test]
async fn timed_out_silence_pass_degrades_to_empty() {
    let runner = TwoPassRunner::new(
        Ok(VOLUME_OUTPUT),
        Err(ProcessError::timeout("silence pass took too long")),
    );
    let detector = QuietRegionDetector::default().with_timeout(Duration::from_secs(1));

    assert!(detector.detect(&runner, "talk.wav", None).await.is_empty());
    let seen = runner.seen.lock().unwrap();
    assert!(seen
        .iter()
        .all(|r| r.timeout == Some(Duration::from_secs(1))));
}

#[tokio::test]
async fn inverted_threshold_window_degrades_without_running() {
    let runner = TwoPassRunner::new(Ok(VOLUME_OUTPUT), Ok(SILENCE_OUTPUT));
    let detector = QuietRegionDetector::new(QuietDetectionSettings {
        min_threshold_db: -20.0,
        max_threshold_db: -40.0,
        ..QuietDetectionSettings::default()
    });

    let err = detector
        .try_detect(&runner, "talk.wav", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DetectionError::InvalidSettings(_)));
    assert!(detector.detect(&runner, "talk.wav", None).await.is_empty());
    assert!(runner.phases().is_empty());
}
