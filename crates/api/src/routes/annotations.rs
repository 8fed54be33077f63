use axum::routing::get;
use axum::Router;

use crate::handlers::annotations;
use crate::state::AppState;

/// Mounted at `/annotations`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{video_id}", get(annotations::get_annotations))
}
