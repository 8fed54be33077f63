//! Polls extraction progress and turns it into user-facing status updates.

use std::future::Future;
use std::time::Duration;

use ppe_core::extraction::{ExtractionStatus, ProgressRecord};

use crate::client::{ViewerApi, ViewerApiError};

/// Percent shown when monitoring gives up.
const TIMEOUT_PERCENT: f64 = 95.0;
const TIMEOUT_DETAILS: &str = "Frame extraction may still be in progress...";

/// Anything that can report a video's progress record.
pub trait ProgressSource: Send + Sync {
    fn fetch_progress(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<ProgressRecord, ViewerApiError>> + Send;
}

impl ProgressSource for ViewerApi {
    async fn fetch_progress(&self, video_id: &str) -> Result<ProgressRecord, ViewerApiError> {
        self.get_progress(video_id).await
    }
}

/// One progress display update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub percent: f64,
    pub status_text: String,
    pub details: String,
}

/// Receives status updates, e.g. a progress bar or a log line.
pub trait ProgressSink {
    fn update(&mut self, update: &StatusUpdate);
}

impl<F: FnMut(&StatusUpdate)> ProgressSink for F {
    fn update(&mut self, update: &StatusUpdate) {
        self(update)
    }
}

/// Position of this video in a multi-file batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPosition {
    pub file_name: String,
    /// 1-based.
    pub index: u32,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub max_attempts: u32,
    /// How long the final update stays up before returning.
    pub completed_hold: Duration,
    pub error_hold: Duration,
    pub timeout_hold: Duration,
    pub batch: Option<BatchPosition>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_attempts: 300,
            completed_hold: Duration::from_secs(1),
            error_hold: Duration::from_secs(2),
            timeout_hold: Duration::from_secs(2),
            batch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Completed(ProgressRecord),
    Failed(ProgressRecord),
    /// Attempts ran out; the extraction may still finish.
    TimedOut,
}

/// Fields whose change triggers a new update.
#[derive(Debug, PartialEq)]
struct Observed {
    percent: f64,
    frames_saved: u64,
    status: ExtractionStatus,
    output: String,
}

impl From<&ProgressRecord> for Observed {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            percent: record.percent,
            frames_saved: record.frames_saved,
            status: record.status,
            output: record.raw_output.clone(),
        }
    }
}

/// Poll `video_id` until its extraction completes, fails or the attempt
/// ceiling is reached.
///
/// The first observation is always reported; after that only changes are.
/// `not_found` and transport errors keep the loop going.
pub async fn monitor<P, K>(
    source: &P,
    video_id: &str,
    options: &MonitorOptions,
    sink: &mut K,
) -> MonitorOutcome
where
    P: ProgressSource,
    K: ProgressSink,
{
    let batch = options.batch.as_ref();
    let mut last: Option<Observed> = None;

    for attempt in 1..=options.max_attempts {
        match source.fetch_progress(video_id).await {
            Ok(record) => {
                let observed = Observed::from(&record);
                if record.status.is_terminal() || last.as_ref() != Some(&observed) {
                    sink.update(&describe(&record, batch));
                    last = Some(observed);
                }

                match record.status {
                    ExtractionStatus::Completed => {
                        tracing::info!(video_id, attempt, frames = record.frames_saved, "Extraction completed");
                        tokio::time::sleep(options.completed_hold).await;
                        return MonitorOutcome::Completed(record);
                    }
                    ExtractionStatus::Error => {
                        tracing::error!(video_id, attempt, "Extraction failed");
                        tokio::time::sleep(options.error_hold).await;
                        return MonitorOutcome::Failed(record);
                    }
                    _ => {}
                }
            }
            Err(e) => {
                tracing::warn!(video_id, attempt, error = %e, "Progress poll failed");
            }
        }

        tokio::time::sleep(options.interval).await;
    }

    tracing::warn!(video_id, attempts = options.max_attempts, "Progress monitoring timed out");
    sink.update(&StatusUpdate {
        percent: TIMEOUT_PERCENT,
        status_text: format!("{TIMEOUT_PERCENT:.0}%"),
        details: TIMEOUT_DETAILS.to_string(),
    });
    tokio::time::sleep(options.timeout_hold).await;
    MonitorOutcome::TimedOut
}

/// Percent across a batch: earlier files count as done, this one is
/// weighted by `1 / total`.
pub fn overall_percent(percent: f64, batch: Option<&BatchPosition>) -> f64 {
    match batch {
        Some(b) if b.total > 0 => {
            let weight = 1.0 / f64::from(b.total);
            (f64::from(b.index.saturating_sub(1)) * weight + percent / 100.0 * weight) * 100.0
        }
        _ => percent,
    }
}

/// Translate a progress record into display text.
pub fn describe(record: &ProgressRecord, batch: Option<&BatchPosition>) -> StatusUpdate {
    let percent = overall_percent(record.percent, batch);
    let rounded = record.percent.round();
    let saved = match record.total_frames {
        Some(total) if total > 0 => format!("Saved {} frames / {total}", record.frames_saved),
        _ => format!("Saved {} frames", record.frames_saved),
    };
    let with_file = |text: String| match batch {
        Some(b) => format!("File: {} ({}/{}) - {text}", b.file_name, b.index, b.total),
        None => text,
    };

    let (status_text, details) = match record.status {
        ExtractionStatus::Starting => (
            match batch {
                Some(b) => format!(
                    "Starting frame extraction for {} ({}/{})",
                    b.file_name, b.index, b.total
                ),
                None => "Starting frame extraction...".to_string(),
            },
            "Initializing extraction process...".to_string(),
        ),
        ExtractionStatus::Extracting => (format!("Extracting frames: {rounded}%"), with_file(saved)),
        ExtractionStatus::Processing => (format!("Processing frames: {rounded}%"), with_file(saved)),
        ExtractionStatus::Completed => (
            match batch {
                Some(b) => format!("Frame extraction completed for {}", b.file_name),
                None => "Frame extraction completed!".to_string(),
            },
            match batch {
                Some(b) => format!(
                    "Successfully extracted {} frames ({}/{})",
                    record.frames_saved, b.index, b.total
                ),
                None => format!("Successfully extracted {} frames", record.frames_saved),
            },
        ),
        ExtractionStatus::Error => (
            match batch {
                Some(b) => format!("Frame extraction failed for {}", b.file_name),
                None => "Frame extraction failed!".to_string(),
            },
            "An error occurred during frame extraction".to_string(),
        ),
        ExtractionStatus::NotFound => (
            match batch {
                Some(b) => format!("Waiting for extraction to start for {}", b.file_name),
                None => "Waiting for extraction to start...".to_string(),
            },
            "Process may still be initializing".to_string(),
        ),
    };

    StatusUpdate {
        percent,
        status_text,
        details,
    }
}
