use std::sync::Arc;

use crate::config::ServerConfig;
use crate::extraction::{ExtractionLauncher, ProgressStore};
use crate::storage::UploadStorage;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Upload directory layout (videos, annotations, frame sequences).
    pub storage: Arc<UploadStorage>,
    /// Per-video extraction progress.
    pub progress: Arc<ProgressStore>,
    /// Spawns extractor processes that report into `progress`.
    pub launcher: Arc<ExtractionLauncher>,
}

impl AppState {
    /// Wire up state from configuration using a caller-supplied store.
    pub fn new(config: &ServerConfig, progress: Arc<ProgressStore>) -> Self {
        let storage = Arc::new(UploadStorage::new(config.upload_dir.clone()));
        let launcher = Arc::new(ExtractionLauncher::new(
            Arc::clone(&progress),
            config.extractor_command(),
        ));
        Self {
            storage,
            progress,
            launcher,
        }
    }
}
