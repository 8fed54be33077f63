use std::collections::HashMap;
use std::sync::Arc;

use ppe_core::extraction::{ExtractionStatus, ProgressRecord};
use ppe_core::types::Timestamp;
use tokio::sync::RwLock;

/// Source of "now" for record timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// Keyed store of extraction progress, one record per video id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the HTTP handlers and the per-extraction output tasks.
pub struct ProgressStore {
    records: RwLock<HashMap<String, ProgressRecord>>,
    clock: Arc<dyn Clock>,
}

impl ProgressStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Snapshot of the record for `video_id`, if any.
    pub async fn get(&self, video_id: &str) -> Option<ProgressRecord> {
        self.records.read().await.get(video_id).cloned()
    }

    /// Insert or replace the record for `video_id`.
    pub async fn insert(&self, video_id: &str, record: ProgressRecord) {
        self.records
            .write()
            .await
            .insert(video_id.to_string(), record);
    }

    /// Mutate the record for `video_id` in place.
    ///
    /// Returns `false` (and does nothing) when no record exists, e.g. the
    /// video was deleted while its extraction was still writing output.
    pub async fn update<F>(&self, video_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ProgressRecord, Timestamp),
    {
        let now = self.clock.now();
        match self.records.write().await.get_mut(video_id) {
            Some(record) => {
                f(record, now);
                true
            }
            None => false,
        }
    }

    /// Remove and return the record for `video_id`.
    pub async fn remove(&self, video_id: &str) -> Option<ProgressRecord> {
        self.records.write().await.remove(video_id)
    }

    /// Register a fresh `starting` record unless one is already starting.
    ///
    /// The check and the insert happen under a single write lock, so two
    /// concurrent launches for the same video cannot both succeed. Returns
    /// `true` when the record was inserted.
    pub async fn try_begin(&self, video_id: &str) -> bool {
        let now = self.clock.now();
        let mut records = self.records.write().await;
        if records
            .get(video_id)
            .is_some_and(|r| r.status == ExtractionStatus::Starting)
        {
            return false;
        }
        records.insert(video_id.to_string(), ProgressRecord::starting(now));
        true
    }

    /// Number of extractions that have not reached a terminal status.
    pub async fn active_count(&self) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
