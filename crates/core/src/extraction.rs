//! Frame-extraction progress model and output parser.
//!
//! The external extractor reports progress as free-form text lines on
//! stdout. [`parse_extraction_output`] turns the whole accumulated output
//! into a [`ProgressSnapshot`]; the server stores it as a
//! [`ProgressRecord`] and the client reads the same record back over HTTP.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Line markers
// ---------------------------------------------------------------------------

const VIDEO_INFO_MARKER: &str = "Video info:";
const PROGRESS_MARKER: &str = "Progress:";
const PROCESSING_MARKER: &str = "Processing frame";
const COMPLETED_MARKER: &str = "Frame extraction completed:";
const ERROR_MARKER: &str = "Error:";

/// Upper bound for the reported percentage.
pub const MAX_PERCENT: f64 = 100.0;

static TOTAL_FRAMES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) frames").expect("valid regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Progress: ([\d.]+)%").expect("valid regex"));
static PROGRESS_FRAMES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+) frames saved\)").expect("valid regex"));
static COMPLETED_FRAMES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) frames saved").expect("valid regex"));

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of one video's extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Starting,
    Extracting,
    Processing,
    Completed,
    Error,
    NotFound,
}

impl ExtractionStatus {
    /// Return the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Extracting => "extracting",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::NotFound => "not_found",
        }
    }

    /// `completed` and `error` end an extraction; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot / record
// ---------------------------------------------------------------------------

/// Progress fields derived from extractor output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub frames_saved: u64,
    pub total_frames: Option<u64>,
    pub status: ExtractionStatus,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            percent: 0.0,
            frames_saved: 0,
            total_frames: None,
            status: ExtractionStatus::Starting,
        }
    }
}

/// Progress of one video's extraction, as stored by the server and
/// returned by `GET /extraction/progress/{video_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub percent: f64,
    pub frames_saved: u64,
    pub total_frames: Option<u64>,
    pub status: ExtractionStatus,
    pub last_update: Timestamp,
    /// Everything the extractor has written to stdout so far.
    #[serde(default)]
    pub raw_output: String,
}

impl ProgressRecord {
    /// Initial record stored when an extraction is launched.
    pub fn starting(now: Timestamp) -> Self {
        Self {
            percent: 0.0,
            frames_saved: 0,
            total_frames: None,
            status: ExtractionStatus::Starting,
            last_update: now,
            raw_output: String::new(),
        }
    }

    /// Placeholder reported for a video with no extraction registered.
    pub fn not_found(now: Timestamp) -> Self {
        Self {
            status: ExtractionStatus::NotFound,
            ..Self::starting(now)
        }
    }

    /// Merge a freshly parsed snapshot, replacing the accumulated output.
    pub fn apply_snapshot(&mut self, snapshot: ProgressSnapshot, raw_output: String, now: Timestamp) {
        self.percent = snapshot.percent;
        self.frames_saved = snapshot.frames_saved;
        self.total_frames = snapshot.total_frames;
        self.status = snapshot.status;
        self.raw_output = raw_output;
        self.last_update = now;
    }

    /// Record the extractor's exit. Percent is forced to 100 only on success.
    pub fn apply_exit(&mut self, success: bool, now: Timestamp) {
        if success {
            self.status = ExtractionStatus::Completed;
            self.percent = MAX_PERCENT;
        } else {
            self.status = ExtractionStatus::Error;
        }
        self.last_update = now;
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Derive extraction progress from the complete output written so far.
///
/// Every call rescans all lines from the start, so the resulting status is
/// that of the *last* matching line: a `Processing frame` line after a
/// `Progress:` line reports `processing` even though percent is non-zero.
/// Unmatched input yields the defaults; this function never fails.
pub fn parse_extraction_output(output: &str) -> ProgressSnapshot {
    let mut snapshot = ProgressSnapshot::default();

    for line in output.lines() {
        if line.contains(VIDEO_INFO_MARKER) {
            if let Some(total) = capture_u64(&TOTAL_FRAMES_RE, line) {
                snapshot.total_frames = Some(total);
            }
        }

        if line.contains(PROGRESS_MARKER) {
            if let Some(percent) = PERCENT_RE
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| parse_leading_float(m.as_str()))
            {
                snapshot.percent = percent;
            }
            if let Some(saved) = capture_u64(&PROGRESS_FRAMES_RE, line) {
                snapshot.frames_saved = saved;
            }
            snapshot.status = ExtractionStatus::Extracting;
        }

        if line.contains(PROCESSING_MARKER) {
            snapshot.status = ExtractionStatus::Processing;
        }

        if line.contains(COMPLETED_MARKER) {
            snapshot.status = ExtractionStatus::Completed;
            snapshot.percent = MAX_PERCENT;
            if let Some(saved) = capture_u64(&COMPLETED_FRAMES_RE, line) {
                snapshot.frames_saved = saved;
            }
        }

        if line.contains(ERROR_MARKER) {
            snapshot.status = ExtractionStatus::Error;
        }
    }

    snapshot.percent = snapshot.percent.min(MAX_PERCENT);
    snapshot
}

fn capture_u64(re: &Regex, line: &str) -> Option<u64> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse the longest leading prefix of `s` that is a valid float
/// (`"12.5.1"` reads as `12.5`).
fn parse_leading_float(s: &str) -> Option<f64> {
    (1..=s.len())
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
