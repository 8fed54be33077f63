use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ppe_core::error::CoreError;
use ppe_core::ffmpeg::FfmpegError;
use serde_json::json;

/// Error type for viewer API handlers.
///
/// Every variant renders as `{ "error": message, "code": CODE }`. Internal
/// failures are logged in full and reported with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Filesystem failure under the upload directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ffprobe / ffmpeg failure.
    #[error("Media error: {0}")]
    Media(#[from] FfmpegError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Status, machine-readable code and client-facing message.
type ErrorParts = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(err) => classify_core_error(err),
            AppError::Io(err) => classify_io_error(err),
            AppError::Media(err) => classify_media_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> ErrorParts {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// A missing file is a 404; anything else is a server fault.
fn classify_io_error(err: &std::io::Error) -> ErrorParts {
    if err.kind() == std::io::ErrorKind::NotFound {
        return (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        );
    }
    tracing::error!(error = %err, "Upload directory I/O failed");
    internal()
}

/// A missing input is a 404 and a file without a video stream is a 400.
/// Tool failures are logged and sanitized.
fn classify_media_error(err: &FfmpegError) -> ErrorParts {
    match err {
        FfmpegError::VideoNotFound(_) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Video file not found".to_string(),
        ),
        FfmpegError::NoVideoStream => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string()),
        other => {
            tracing::error!(error = %other, "Media tool failed");
            internal()
        }
    }
}
