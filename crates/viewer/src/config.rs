use crate::cache::DEFAULT_CAPACITY;
use crate::loader::DEFAULT_PRELOAD_BUFFER;

/// Viewer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// API base URL including the `/api/v1` prefix.
    pub base_url: String,
    /// Decoded frames kept in memory.
    pub max_cache_size: usize,
    /// Frames fetched ahead of the current one.
    pub preload_buffer: u32,
    /// Shorten frame delays when upcoming frames are already cached.
    pub adaptive_playback: bool,
    /// Playback rate multiplier.
    pub playback_speed: f64,
}

impl ViewerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                        |
    /// |----------------------------|--------------------------------|
    /// | `VIEWER_BASE_URL`          | `http://localhost:3000/api/v1` |
    /// | `VIEWER_MAX_CACHE_SIZE`    | `50`                           |
    /// | `VIEWER_PRELOAD_BUFFER`    | `3`                            |
    /// | `VIEWER_ADAPTIVE_PLAYBACK` | `true`                         |
    /// | `VIEWER_PLAYBACK_SPEED`    | `1.0`                          |
    pub fn from_env() -> Self {
        let base_url = std::env::var("VIEWER_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api/v1".into());

        let max_cache_size: usize = std::env::var("VIEWER_MAX_CACHE_SIZE")
            .map(|v| v.parse().expect("VIEWER_MAX_CACHE_SIZE must be a valid usize"))
            .unwrap_or(DEFAULT_CAPACITY);

        let preload_buffer: u32 = std::env::var("VIEWER_PRELOAD_BUFFER")
            .map(|v| v.parse().expect("VIEWER_PRELOAD_BUFFER must be a valid u32"))
            .unwrap_or(DEFAULT_PRELOAD_BUFFER);

        let adaptive_playback: bool = std::env::var("VIEWER_ADAPTIVE_PLAYBACK")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("VIEWER_ADAPTIVE_PLAYBACK must be true or false");

        let playback_speed: f64 = std::env::var("VIEWER_PLAYBACK_SPEED")
            .unwrap_or_else(|_| "1.0".into())
            .parse()
            .expect("VIEWER_PLAYBACK_SPEED must be a number");
        assert!(
            playback_speed > 0.0,
            "VIEWER_PLAYBACK_SPEED must be greater than zero"
        );

        Self {
            base_url,
            max_cache_size,
            preload_buffer,
            adaptive_playback,
            playback_speed,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1".into(),
            max_cache_size: DEFAULT_CAPACITY,
            preload_buffer: DEFAULT_PRELOAD_BUFFER,
            adaptive_playback: true,
            playback_speed: 1.0,
        }
    }
}
