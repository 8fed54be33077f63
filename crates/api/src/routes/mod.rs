pub mod annotations;
pub mod extraction;
pub mod frames;
pub mod health;
pub mod videos;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /extraction/start                     launch extraction (POST)
/// /extraction/progress/{video_id}       progress record (GET)
///
/// /frame/{video_id}/{frame}             on-demand JPEG frame (GET)
/// /frames/{video_id}                    sequence listing (GET)
/// /frames/{video_id}/{name}             sequence image (GET)
///
/// /annotations/{video_id}               annotation JSON (GET)
///
/// /videos/{video_id}                    delete video (DELETE)
/// /videos/{video_id}/info               playback metadata (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/extraction", extraction::router())
        .merge(frames::router())
        .nest("/annotations", annotations::router())
        .nest("/videos", videos::router())
}
