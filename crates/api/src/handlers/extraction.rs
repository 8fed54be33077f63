//! Handlers for launching extractions and reading their progress.

use axum::extract::{Path, State};
use axum::Json;
use ppe_core::error::CoreError;
use ppe_core::extraction::ProgressRecord;
use ppe_core::types::validate_video_id;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extraction::LaunchOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtractionRequest {
    pub video_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtractionResponse {
    pub status: LaunchOutcome,
    pub video_id: String,
}

/// POST /api/v1/extraction/start
///
/// Launches frame extraction for an uploaded video. A second request while
/// the first is still `starting` answers `already_running`.
pub async fn start_extraction(
    State(state): State<AppState>,
    Json(input): Json<StartExtractionRequest>,
) -> AppResult<Json<StartExtractionResponse>> {
    let video_id = input.video_id;
    validate_video_id(&video_id)?;

    let video_path = state
        .storage
        .find_video(&video_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Video",
            id: video_id.clone(),
        })?;
    let output_dir = state.storage.frames_dir(&video_id);

    let status = state
        .launcher
        .launch(&video_path, &video_id, &output_dir)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(Json(StartExtractionResponse { status, video_id }))
}

/// GET /api/v1/extraction/progress/{video_id}
///
/// Unknown videos report a `not_found` record rather than an error.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<ProgressRecord>> {
    validate_video_id(&video_id)?;

    let record = match state.progress.get(&video_id).await {
        Some(record) => record,
        None => ProgressRecord::not_found(state.progress.now()),
    };
    Ok(Json(record))
}
