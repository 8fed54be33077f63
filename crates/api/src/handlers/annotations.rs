use axum::extract::{Path, State};
use axum::Json;
use ppe_core::error::CoreError;
use ppe_core::types::validate_video_id;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/annotations/{video_id}
///
/// Returns the annotation file as stored, keyed by 5-digit frame index.
/// A file that is not a JSON object is rejected with 400.
pub async fn get_annotations(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    validate_video_id(&video_id)?;

    let path = state.storage.annotation_path(&video_id);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::NotFound {
                entity: "Annotations",
                id: video_id,
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(video_id = %video_id, error = %e, "Malformed annotation file");
        CoreError::Validation(format!("Malformed annotation file: {e}"))
    })?;
    if !value.is_object() {
        return Err(CoreError::Validation(
            "Annotation file must be a JSON object keyed by frame index".into(),
        )
        .into());
    }

    Ok(Json(value))
}
