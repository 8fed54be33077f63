//! Frame routes. Merged at the API root because single frames live under
//! `/frame` and sequences under `/frames`.
//!
//! ```text
//! GET /frame/{video_id}/{frame}     get_frame
//! GET /frames/{video_id}            list_frames
//! GET /frames/{video_id}/{name}     get_sequence_frame
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::frames;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/frame/{video_id}/{frame}", get(frames::get_frame))
        .route("/frames/{video_id}", get(frames::list_frames))
        .route("/frames/{video_id}/{name}", get(frames::get_sequence_frame))
}
