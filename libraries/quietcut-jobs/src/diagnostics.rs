//! Diagnostic stream handling
//!
//! The media tool writes its diagnostics to stderr. Status lines are rewritten
//! in place with carriage returns, so the stream is split on both `\r` and
//! `\n`. Progress markers come in three forms:
//! - `time=HH:MM:SS.cc`
//! - `time=<seconds>`
//! - `out_time_ms=<microseconds>` (the `-progress` key/value output)

use std::collections::VecDeque;
use std::time::Duration;

/// Upper bound on retained non-status lines per job
const MAX_RETAINED_LINES: usize = 20_000;

/// Bytes kept for one unterminated line; the rest of it is dropped
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Incremental splitter turning raw stderr chunks into lines
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.take_pending() {
                    lines.push(line);
                }
            } else if self.pending.len() < MAX_PENDING_BYTES {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim_end().to_string();
        self.pending.clear();
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

/// Extract the media position reported by a progress line
pub fn parse_progress_position(line: &str) -> Option<Duration> {
    if let Some(value) = value_after(line, "out_time_ms=") {
        let micros: u64 = value.parse().ok()?;
        return Some(Duration::from_micros(micros));
    }
    value_after(line, "time=").and_then(parse_timestamp)
}

/// Parse `HH:MM:SS.cc` or plain seconds
pub fn parse_timestamp(value: &str) -> Option<Duration> {
    let parts: Vec<&str> = value.split(':').collect();
    let seconds = match parts.as_slice() {
        [secs] => secs.parse::<f64>().ok()?,
        [hours, minutes, secs] => {
            let hours: u64 = hours.parse().ok()?;
            let minutes: u64 = minutes.parse().ok()?;
            let secs: f64 = secs.parse().ok()?;
            let whole = hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?;
            whole as f64 + secs
        }
        _ => return None,
    };
    // Out-of-range markers are ignored rather than trusted
    Duration::try_from_secs_f64(seconds).ok()
}

/// Value of `key` when it starts a whitespace-delimited token
fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(offset) = line[search_from..].find(key) {
        let start = search_from + offset;
        let at_boundary = line[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        if at_boundary {
            let rest = line[start + key.len()..].trim_start();
            return rest.split_whitespace().next();
        }
        search_from = start + key.len();
    }
    None
}

/// Diagnostic output retained for one job
///
/// Status lines are collapsed to the most recent one; everything else
/// (measurement blocks, detection markers, errors) is kept in order.
#[derive(Debug)]
pub struct DiagnosticLog {
    lines: VecDeque<String>,
    last_status: Option<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            last_status: None,
        }
    }

    /// Record a line; returns the progress position if it carried one
    pub fn record(&mut self, line: String) -> Option<Duration> {
        if let Some(position) = parse_progress_position(&line) {
            self.last_status = Some(line);
            return Some(position);
        }
        if self.lines.len() == MAX_RETAINED_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        None
    }

    /// Every retained line
    pub fn full_text(&self) -> String {
        let mut lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if let Some(status) = &self.last_status {
            lines.push(status);
        }
        lines.join("\n")
    }

    /// The last `count` retained lines, the final status line included
    pub fn tail(&self, count: usize) -> String {
        if count == 0 {
            return String::new();
        }
        let keep = if self.last_status.is_some() {
            count - 1
        } else {
            count
        };
        let skip = self.lines.len().saturating_sub(keep);
        let mut lines: Vec<&str> = self.lines.iter().skip(skip).map(String::as_str).collect();
        if let Some(status) = &self.last_status {
            lines.push(status);
        }
        lines.join("\n")
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep at most `max_chars` trailing characters of `text`
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - max_chars).collect();
    format!("...{}", tail)
}
