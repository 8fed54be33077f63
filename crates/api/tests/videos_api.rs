//! Integration tests for video deletion.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, get};

#[tokio::test]
async fn delete_removes_video_frames_and_progress() {
    let test = common::build_test_app();
    let video = test.add_video("ward.mp4");
    let frames = test.add_frames("ward", &["00001.png"]);
    test.progress.try_begin("ward").await;

    let response = delete(test.app.clone(), "/api/v1/videos/ward").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["deleted"], true);
    assert_eq!(json["deletedFrames"], true);

    assert!(!video.exists());
    assert!(!frames.exists());
    assert!(test.progress.get("ward").await.is_none());

    let progress = body_json(get(test.app.clone(), "/api/v1/extraction/progress/ward").await).await;
    assert_eq!(progress["status"], "not_found");
}

#[tokio::test]
async fn delete_without_frames_reports_it() {
    let test = common::build_test_app();
    test.add_video("ward.mp4");

    let json = body_json(delete(test.app.clone(), "/api/v1/videos/ward").await).await;
    assert_eq!(json["deleted"], true);
    assert_eq!(json["deletedFrames"], false);
}

#[tokio::test]
async fn delete_unknown_video_is_404() {
    let test = common::build_test_app();
    let response = delete(test.app.clone(), "/api/v1/videos/ward").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn info_for_unknown_video_is_404() {
    let test = common::build_test_app();
    let response = get(test.app.clone(), "/api/v1/videos/ward/info").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
