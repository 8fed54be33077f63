//! Client side of the PPE annotation viewer.
//!
//! [`client::ViewerApi`] talks to the API server. On top of it sit the
//! extraction [`poller`], the frame [`cache`] and [`loader`], the timed
//! [`playback`] driver and the annotation [`overlay`] state.

pub mod cache;
pub mod client;
pub mod config;
pub mod loader;
pub mod overlay;
pub mod playback;
pub mod poller;
