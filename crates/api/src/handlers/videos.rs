//! Handlers for the `/videos` resource: metadata and deletion.

use axum::extract::{Path, State};
use axum::Json;
use ppe_core::error::CoreError;
use ppe_core::ffmpeg::{self, VideoInfo};
use ppe_core::types::validate_video_id;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVideoResponse {
    pub deleted: bool,
    pub deleted_frames: bool,
}

/// GET /api/v1/videos/{video_id}/info
pub async fn get_video_info(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<VideoInfo>> {
    validate_video_id(&video_id)?;

    let video_path = state
        .storage
        .find_video(&video_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Video",
            id: video_id.clone(),
        })?;

    let probe = ffmpeg::probe_video(&video_path).await?;
    Ok(Json(VideoInfo::from_probe(&video_id, &probe)?))
}

/// DELETE /api/v1/videos/{video_id}
///
/// Removes the source video, its frame directory and its progress record.
/// A failure to remove the frame directory is logged, not returned.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<DeleteVideoResponse>> {
    validate_video_id(&video_id)?;

    let video_path = state.storage.find_video(&video_id).await?;
    let frames_dir = state.storage.frames_dir(&video_id);
    let has_frames = tokio::fs::try_exists(&frames_dir).await.unwrap_or(false);

    if video_path.is_none() && !has_frames {
        return Err(CoreError::NotFound {
            entity: "Video",
            id: video_id,
        }
        .into());
    }

    if let Some(path) = &video_path {
        tokio::fs::remove_file(path).await?;
    }

    let deleted_frames = if has_frames {
        match tokio::fs::remove_dir_all(&frames_dir).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(video_id = %video_id, error = %e, "Failed to remove frame directory");
                false
            }
        }
    } else {
        false
    };

    state.progress.remove(&video_id).await;
    tracing::info!(video_id = %video_id, deleted_frames, "Video deleted");

    Ok(Json(DeleteVideoResponse {
        deleted: true,
        deleted_frames,
    }))
}
