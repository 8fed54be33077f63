//! Shared primitive types and video identifier rules.

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// 1-based video frame number.
pub type FrameNumber = u32;

/// File extensions recognised as source videos.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Validate a video identifier (the video's filename stem).
///
/// Identifiers are joined onto filesystem paths, so anything that could
/// escape the upload directory is rejected.
pub fn validate_video_id(video_id: &str) -> Result<(), CoreError> {
    if video_id.trim().is_empty() {
        return Err(CoreError::Validation("Video id must not be empty".into()));
    }
    if video_id.contains('/') || video_id.contains('\\') || video_id.contains("..") {
        return Err(CoreError::Validation(format!(
            "Invalid video id '{video_id}': path separators are not allowed"
        )));
    }
    if video_id.chars().any(char::is_control) {
        return Err(CoreError::Validation(format!(
            "Invalid video id '{video_id}': control characters are not allowed"
        )));
    }
    Ok(())
}

/// Return `true` if `filename` has one of the [`VIDEO_EXTENSIONS`].
pub fn is_video_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_stem() {
        assert!(validate_video_id("1718000000000-ward_cam_2").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_video_id("").is_err());
        assert!(validate_video_id("   ").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_video_id("../etc").is_err());
        assert!(validate_video_id("a/b").is_err());
        assert!(validate_video_id("a\\b").is_err());
    }

    #[test]
    fn video_extensions_are_case_insensitive() {
        assert!(is_video_file("clip.MP4"));
        assert!(is_video_file("clip.mkv"));
        assert!(!is_video_file("clip.json"));
        assert!(!is_video_file("clip"));
    }
}
