//! ffprobe / ffmpeg helpers for video metadata and single-frame grabs.
//!
//! Both tools are invoked as external commands; their absence surfaces as
//! [`FfmpegError::NotFound`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::FrameNumber;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("video has no video stream")]
    NoVideoStream,

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output
// ---------------------------------------------------------------------------

/// Subset of `ffprobe -print_format json -show_format -show_streams`.
#[derive(Debug, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "30000/1001"
    pub r_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
}

/// Playback metadata for one video, returned by `GET /videos/{id}/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub video_id: String,
    pub duration: f64,
    pub fps: f64,
    pub total_frames: u32,
    pub width: u32,
    pub height: u32,
}

impl VideoInfo {
    /// Build playback metadata from probe output.
    ///
    /// The frame count is `floor(duration * fps)`, matching how frames are
    /// addressed by seek time in [`extract_frame`].
    pub fn from_probe(video_id: &str, probe: &ProbeOutput) -> Result<Self, FfmpegError> {
        let stream = video_stream(probe).ok_or(FfmpegError::NoVideoStream)?;
        let fps = stream.r_frame_rate.as_deref().map(parse_rate).unwrap_or(0.0);
        let duration = probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        let total_frames = if duration > 0.0 && fps > 0.0 {
            (duration * fps).floor() as u32
        } else {
            0
        };

        Ok(Self {
            video_id: video_id.to_string(),
            duration,
            fps,
            total_frames,
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
        })
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<ProbeOutput, FfmpegError> {
    ensure_exists(path)?;

    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    serde_json::from_slice::<ProbeOutput>(&output.stdout)
        .map_err(|e| FfmpegError::ParseError(e.to_string()))
}

/// Grab 1-based `frame` from a video as a JPEG written to `output_path`.
///
/// The frame is addressed by seek time `(frame - 1) / fps`.
pub async fn extract_frame(
    video_path: &Path,
    output_path: &Path,
    frame: FrameNumber,
    fps: f64,
) -> Result<(), FfmpegError> {
    ensure_exists(video_path)?;

    let seek_secs = seek_time(frame, fps);
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-ss", &format!("{seek_secs:.3}"), "-i"])
        .arg(video_path)
        .args(["-frames:v", "1", "-q:v", "2"])
        .arg(output_path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_exists(path: &Path) -> Result<(), FfmpegError> {
    if path.exists() {
        Ok(())
    } else {
        Err(FfmpegError::VideoNotFound(path.to_string_lossy().into_owned()))
    }
}

fn video_stream(probe: &ProbeOutput) -> Option<&ProbeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Seek offset in seconds for a 1-based frame number.
pub fn seek_time(frame: FrameNumber, fps: f64) -> f64 {
    if fps > 0.0 {
        f64::from(frame.saturating_sub(1)) / fps
    } else {
        0.0
    }
}

/// Parse an ffprobe rate such as `"30000/1001"` or `"25"`.
pub fn parse_rate(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().unwrap_or(0.0);
            let den = den.trim().parse::<f64>().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => s.trim().parse::<f64>().unwrap_or(0.0),
    }
}
