//! Upload directory layout.
//!
//! ```text
//! UPLOAD_DIR/
//!   {video_id}.{mp4|avi|mov|mkv}   source videos
//!   {video_id}.json                annotation files
//!   frames/{video_id}/NNNNN.png    extracted frame sequences
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ppe_core::error::CoreError;
use ppe_core::types::is_video_file;

const FRAMES_DIR: &str = "frames";
const SEQUENCE_EXTENSION: &str = "png";

/// Resolves video ids to paths under the upload directory.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the extracted sequence for `video_id`.
    pub fn frames_dir(&self, video_id: &str) -> PathBuf {
        self.root.join(FRAMES_DIR).join(video_id)
    }

    pub fn annotation_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{video_id}.json"))
    }

    /// Find the source video whose file stem is `video_id`. The id must
    /// already have passed [`validate_video_id`](ppe_core::types::validate_video_id).
    ///
    /// Returns `Ok(None)` when no video with a recognised extension exists
    /// (including when the upload directory itself is missing).
    pub async fn find_video(&self, video_id: &str) -> std::io::Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_video_file(name) {
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) == Some(video_id)
                && entry.file_type().await?.is_file()
            {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Sorted names of the `.png` files in the video's frame directory.
    ///
    /// `Ok(None)` when the directory does not exist.
    pub async fn list_frames(&self, video_id: &str) -> std::io::Result<Option<Vec<String>>> {
        let mut entries = match tokio::fs::read_dir(self.frames_dir(video_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(SEQUENCE_EXTENSION));
            if !is_png {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                frames.push(name.to_string());
            }
        }
        frames.sort();
        Ok(Some(frames))
    }

    /// Path of one image in the video's sequence.
    ///
    /// The name must be a plain `.png` file name; anything that could leave
    /// the frame directory is rejected.
    pub fn sequence_frame_path(&self, video_id: &str, name: &str) -> Result<PathBuf, CoreError> {
        validate_frame_name(name)?;
        Ok(self.frames_dir(video_id).join(name))
    }
}

/// Validate a sequence image file name such as `00001.png`.
pub fn validate_frame_name(name: &str) -> Result<(), CoreError> {
    let plain = !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..");
    let png = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SEQUENCE_EXTENSION));
    if plain && png {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("Invalid frame name '{name}'")))
    }
}
