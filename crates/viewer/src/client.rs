//! REST API client for the viewer server.
//!
//! Wraps the `/api/v1` endpoints (extraction control, progress, frames,
//! annotations, video metadata) using [`reqwest`].

use ppe_core::annotation::{parse_annotation_file, AnnotationFile};
use ppe_core::extraction::ProgressRecord;
use ppe_core::ffmpeg::VideoInfo;
use ppe_core::types::FrameNumber;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

/// HTTP client for one viewer API server.
#[derive(Debug, Clone)]
pub struct ViewerApi {
    client: reqwest::Client,
    base_url: Url,
}

/// Response of `POST /extraction/start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtractionResponse {
    /// `started` or `already_running`.
    pub status: String,
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
struct FrameListResponse {
    frames: Vec<String>,
}

/// Errors from the viewer REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ViewerApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx body that could not be interpreted.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The configured base URL cannot have path segments appended.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ViewerApiError {
    /// Whether the server answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

impl ViewerApi {
    /// Create a client for `base_url`, e.g. `http://localhost:3000/api/v1`.
    pub fn new(base_url: &str) -> Result<Self, ViewerApiError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ViewerApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ViewerApiError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ViewerApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// `POST /extraction/start`.
    pub async fn start_extraction(
        &self,
        video_id: &str,
    ) -> Result<StartExtractionResponse, ViewerApiError> {
        let body = serde_json::json!({ "videoId": video_id });
        let response = self
            .client
            .post(self.endpoint(&["extraction", "start"])?)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /extraction/progress/{video_id}`.
    pub async fn get_progress(&self, video_id: &str) -> Result<ProgressRecord, ViewerApiError> {
        let response = self
            .client
            .get(self.endpoint(&["extraction", "progress", video_id])?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /videos/{video_id}/info`.
    pub async fn video_info(&self, video_id: &str) -> Result<VideoInfo, ViewerApiError> {
        let response = self
            .client
            .get(self.endpoint(&["videos", video_id, "info"])?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /frames/{video_id}`. `Ok(None)` when the video has no
    /// extracted sequence.
    pub async fn list_frames(&self, video_id: &str) -> Result<Option<Vec<String>>, ViewerApiError> {
        let response = self
            .client
            .get(self.endpoint(&["frames", video_id])?)
            .send()
            .await?;

        match Self::parse_response::<FrameListResponse>(response).await {
            Ok(list) => Ok(Some(list.frames)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `GET /frames/{video_id}/{name}`: one image of the extracted sequence.
    pub async fn fetch_sequence_frame(
        &self,
        video_id: &str,
        name: &str,
    ) -> Result<Vec<u8>, ViewerApiError> {
        let response = self
            .client
            .get(self.endpoint(&["frames", video_id, name])?)
            .send()
            .await?;

        Self::read_bytes(response).await
    }

    /// `GET /frame/{video_id}/{frame}`: one frame extracted on demand.
    pub async fn fetch_frame(
        &self,
        video_id: &str,
        frame: FrameNumber,
    ) -> Result<Vec<u8>, ViewerApiError> {
        let frame = frame.to_string();
        let response = self
            .client
            .get(self.endpoint(&["frame", video_id, &frame])?)
            .send()
            .await?;

        Self::read_bytes(response).await
    }

    /// `GET /annotations/{video_id}`, parsed into the annotation model.
    pub async fn fetch_annotations(&self, video_id: &str) -> Result<AnnotationFile, ViewerApiError> {
        let response = self
            .client
            .get(self.endpoint(&["annotations", video_id])?)
            .send()
            .await?;

        let bytes = Self::read_bytes(response).await?;
        parse_annotation_file(&bytes).map_err(|e| ViewerApiError::Decode(e.to_string()))
    }

    // ---- private helpers ----

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ViewerApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ViewerApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ViewerApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ViewerApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ViewerApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ViewerApiError> {
        let bytes = Self::read_bytes(response).await?;
        serde_json::from_slice(&bytes).map_err(|e| ViewerApiError::Decode(e.to_string()))
    }

    async fn read_bytes(response: reqwest::Response) -> Result<Vec<u8>, ViewerApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
