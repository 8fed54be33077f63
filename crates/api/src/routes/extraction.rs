//! Mounted at `/extraction`.
//!
//! ```text
//! POST /start                      start_extraction
//! GET  /progress/{video_id}        get_progress
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::extraction;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(extraction::start_extraction))
        .route("/progress/{video_id}", get(extraction::get_progress))
}
