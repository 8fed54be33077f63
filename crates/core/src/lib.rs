//! Domain logic for the PPE annotation viewer.
//!
//! Everything in this crate is free of shared state: the extraction output
//! parser, the annotation model and compliance classification, video id
//! rules, and the ffmpeg/ffprobe command helpers. The `ppe-api` server and
//! the `ppe-viewer` client both build on these types.

pub mod annotation;
pub mod error;
pub mod extraction;
pub mod ffmpeg;
pub mod types;
