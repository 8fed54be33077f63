//! Extraction tracking: the in-memory progress store and the launcher that
//! feeds it from the external extractor's output.

pub mod launcher;
pub mod store;

pub use launcher::{ExtractionLauncher, ExtractorCommand, LaunchError, LaunchOutcome};
pub use store::{Clock, ProgressStore, SystemClock};
