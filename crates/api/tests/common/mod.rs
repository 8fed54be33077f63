#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use ppe_api::config::ServerConfig;
use ppe_api::extraction::ProgressStore;
use ppe_api::router::build_app_router;
use ppe_api::state::AppState;

/// A router over a throwaway upload directory.
pub struct TestApp {
    pub app: Router,
    pub progress: Arc<ProgressStore>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn root(&self) -> &Path {
        self.upload_dir.path()
    }

    /// Drop a placeholder video file into the upload directory.
    pub fn add_video(&self, file_name: &str) -> PathBuf {
        let path = self.root().join(file_name);
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    pub fn add_annotations(&self, video_id: &str, contents: &str) {
        std::fs::write(self.root().join(format!("{video_id}.json")), contents).unwrap();
    }

    pub fn add_frames(&self, video_id: &str, names: &[&str]) -> PathBuf {
        let dir = self.root().join("frames").join(video_id);
        std::fs::create_dir_all(&dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"\x89PNG\r\n\x1a\n").unwrap();
        }
        dir
    }
}

/// Build a test `ServerConfig` rooted at `upload_dir`.
///
/// The extractor is `bash <script>`; with no script, `bash` itself is run
/// with the video and output paths as arguments.
pub fn test_config(upload_dir: &Path, script: Option<PathBuf>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        upload_dir: upload_dir.to_path_buf(),
        extractor_program: "bash".to_string(),
        extractor_script: script,
    }
}

/// Build the full application router over a fresh temp directory.
pub fn build_test_app() -> TestApp {
    build_test_app_with(|_| None)
}

/// Like [`build_test_app`], but `make_script` may write an extractor script
/// into the upload directory and return its path.
pub fn build_test_app_with(make_script: impl FnOnce(&Path) -> Option<PathBuf>) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let script = make_script(upload_dir.path());
    let config = test_config(upload_dir.path(), script);

    let progress = Arc::new(ProgressStore::default());
    let state = AppState::new(&config, Arc::clone(&progress));
    let app = build_app_router(state, &config);

    TestApp {
        app,
        progress,
        upload_dir,
    }
}

/// Write a bash extractor script with the given body.
pub fn write_extractor(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake_extractor.sh");
    std::fs::write(&path, format!("#!/bin/bash\n{body}\n")).unwrap();
    path
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll the progress endpoint until the record reaches `completed` or `error`.
pub async fn wait_for_terminal(app: &Router, video_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/extraction/progress/{video_id}");
    for _ in 0..200 {
        let response = get(app.clone(), &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["status"] == "completed" || json["status"] == "error" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("extraction for {video_id} never reached a terminal status");
}
