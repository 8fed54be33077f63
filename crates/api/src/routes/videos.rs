//! Mounted at `/videos`.
//!
//! ```text
//! DELETE /{video_id}          delete_video
//! GET    /{video_id}/info     get_video_info
//! ```

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{video_id}", delete(videos::delete_video))
        .route("/{video_id}/info", get(videos::get_video_info))
}
