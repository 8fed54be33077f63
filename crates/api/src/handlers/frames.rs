//! Handlers for single frames and pre-extracted frame sequences.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ppe_core::error::CoreError;
use ppe_core::ffmpeg::{self, VideoInfo};
use ppe_core::types::{validate_video_id, FrameNumber};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FrameListResponse {
    pub frames: Vec<String>,
}

/// GET /api/v1/frame/{video_id}/{frame}
///
/// Grabs one 1-based frame from the source video with ffmpeg and returns it
/// as a JPEG.
pub async fn get_frame(
    State(state): State<AppState>,
    Path((video_id, frame)): Path<(String, FrameNumber)>,
) -> AppResult<Response> {
    validate_video_id(&video_id)?;
    if frame == 0 {
        return Err(AppError::BadRequest("Frame numbers start at 1".into()));
    }

    let video_path = state
        .storage
        .find_video(&video_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Video",
            id: video_id.clone(),
        })?;

    let probe = ffmpeg::probe_video(&video_path).await?;
    let info = VideoInfo::from_probe(&video_id, &probe)?;
    if info.total_frames > 0 && frame > info.total_frames {
        return Err(CoreError::NotFound {
            entity: "Frame",
            id: format!("{video_id}/{frame}"),
        }
        .into());
    }

    // Removed when dropped, after the bytes have been read back.
    let scratch = tempfile::Builder::new()
        .prefix("ppe-frame-")
        .suffix(".jpg")
        .tempfile()?;
    ffmpeg::extract_frame(&video_path, scratch.path(), frame, info.fps).await?;
    let bytes = tokio::fs::read(scratch.path()).await?;

    tracing::debug!(video_id = %video_id, frame, bytes = bytes.len(), "Extracted frame");

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

/// GET /api/v1/frames/{video_id}
///
/// Sorted names of the extracted `.png` sequence. 404 until the frame
/// directory exists.
pub async fn list_frames(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<FrameListResponse>> {
    validate_video_id(&video_id)?;

    let frames = state
        .storage
        .list_frames(&video_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Frames",
            id: video_id,
        })?;

    Ok(Json(FrameListResponse { frames }))
}

/// GET /api/v1/frames/{video_id}/{name}
pub async fn get_sequence_frame(
    State(state): State<AppState>,
    Path((video_id, name)): Path<(String, String)>,
) -> AppResult<Response> {
    validate_video_id(&video_id)?;
    let path = state.storage.sequence_frame_path(&video_id, &name)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::NotFound {
                entity: "Frame",
                id: format!("{video_id}/{name}"),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };
    let stream = ReaderStream::new(file);

    Ok((
        [(header::CONTENT_TYPE, "image/png")],
        Body::from_stream(stream),
    )
        .into_response())
}
