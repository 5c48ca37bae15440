/// Standard render strategy ladders
use quietcut_core::TimeRange;
use quietcut_jobs::{RenderAttempt, RenderStrategy};
use std::path::Path;

/// Preferred encoder arguments for an output container
fn encoder_args(output: &str) -> Vec<&'static str> {
    let extension = Path::new(output)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp3") => vec!["-c:a", "libmp3lame", "-b:a", "192k"],
        Some("m4a" | "aac" | "mp4") => vec!["-c:a", "aac", "-b:a", "192k"],
        Some("flac") => vec!["-c:a", "flac"],
        Some("ogg") => vec!["-c:a", "libvorbis", "-q:a", "6"],
        Some("opus") => vec!["-c:a", "libopus", "-b:a", "128k"],
        Some("wav") => vec!["-c:a", "pcm_s16le"],
        _ => Vec::new(),
    }
}

fn base_args(input: &str, window: Option<&TimeRange>) -> Vec<String> {
    let mut args = vec!["-hide_banner".to_string(), "-y".to_string()];
    if let Some(window) = window {
        args.extend(window.seek_args());
    }
    args.extend(["-i".to_string(), input.to_string()]);
    args
}

/// Copy, re-encode, then last resort for rendering `input` to `output`
///
/// The last-resort attempt drops video, forces stereo at 44.1 kHz and lets
/// the tool pick the container's default encoder.
pub fn standard_attempts(
    input: &str,
    output: &str,
    window: Option<&TimeRange>,
) -> Vec<RenderAttempt> {
    let mut copy = base_args(input, window);
    copy.extend(["-c".to_string(), "copy".to_string(), output.to_string()]);

    let mut reencode = base_args(input, window);
    reencode.extend(encoder_args(output).into_iter().map(String::from));
    reencode.push(output.to_string());

    let mut last_resort = base_args(input, window);
    last_resort.extend(
        ["-vn", "-ac", "2", "-ar", "44100", output]
            .into_iter()
            .map(String::from),
    );

    vec![
        RenderAttempt::new(RenderStrategy::Copy, copy),
        RenderAttempt::new(RenderStrategy::Reencode, reencode),
        RenderAttempt::new(RenderStrategy::LastResort, last_resort),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_order_and_output_position() {
        let attempts = standard_attempts("in.wav", "out.mp3", None);
        let strategies: Vec<_> = attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(
            strategies,
            vec![
                RenderStrategy::Copy,
                RenderStrategy::Reencode,
                RenderStrategy::LastResort
            ]
        );
        for attempt in &attempts {
            assert_eq!(attempt.args.last().map(String::as_str), Some("out.mp3"));
        }
        assert!(attempts[1].args.contains(&"libmp3lame".to_string()));
    }

    #[test]
    fn window_seeks_before_input() {
        let window = TimeRange::new(500, 2_000).unwrap();
        let attempts = standard_attempts("in.wav", "out.wav", Some(&window));
        assert_eq!(
            attempts[0].args,
            vec![
                "-hide_banner",
                "-y",
                "-ss",
                "0.500",
                "-t",
                "1.500",
                "-i",
                "in.wav",
                "-c",
                "copy",
                "out.wav"
            ]
        );
    }

    #[test]
    fn unknown_extension_lets_tool_choose_encoder() {
        let attempts = standard_attempts("in.wav", "out.xyz", None);
        assert_eq!(attempts[1].args, vec!["-hide_banner", "-y", "-i", "in.wav", "out.xyz"]);
    }
}
