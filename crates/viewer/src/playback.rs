//! Timed playback over a [`FrameLoader`].
//!
//! One spawned task per [`PlaybackDriver::start`] renders the current frame,
//! preloads ahead and sleeps the frame delay. [`PlaybackDriver::stop`] cancels
//! the task's [`CancellationToken`]; a render that resolves after the stop
//! is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ppe_core::types::FrameNumber;
use tokio_util::sync::CancellationToken;

use crate::config::ViewerConfig;
use crate::loader::{FrameImage, FrameLoader, FrameSource};

/// Frame rate assumed when the video reports none.
const FALLBACK_FPS: f64 = 30.0;

/// How many upcoming frames are inspected for delay compensation.
const COMPENSATION_WINDOW: u32 = 5;

/// Receives frames as playback advances.
pub trait FrameRenderer: Send + Sync + 'static {
    fn render(&self, frame: FrameNumber, image: FrameImage);

    /// Called after every tick so side panels can follow the current frame.
    fn refresh_details(&self, _frame: FrameNumber) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Multiplier on the native frame rate.
    pub speed: f64,
    /// Shorten the delay when upcoming frames are already cached.
    pub adaptive: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            adaptive: true,
        }
    }
}

impl PlaybackSettings {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            speed: config.playback_speed,
            adaptive: config.adaptive_playback,
        }
    }
}

/// Delay multiplier given how many of the next frames are cached back to back.
pub fn compensation_factor(consecutive_cached: u32) -> f64 {
    match consecutive_cached {
        n if n >= 3 => 0.8,
        n if n >= 1 => 0.9,
        _ => 1.0,
    }
}

/// Time to hold one frame: `1000 / fps` ms, divided by `speed`, times
/// `compensation`.
pub fn frame_delay(fps: f64, speed: f64, compensation: f64) -> Duration {
    let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
    let speed = if speed > 0.0 { speed } else { 1.0 };
    Duration::from_secs_f64(1.0 / fps / speed * compensation)
}

struct DriverState {
    current_frame: FrameNumber,
    playing: bool,
    cancel: Option<CancellationToken>,
}

struct DriverInner<S, R> {
    loader: FrameLoader<S>,
    renderer: R,
    fps: f64,
    settings: PlaybackSettings,
    state: Mutex<DriverState>,
}

/// Plays one video's frames through a renderer. Clones share the same
/// playback.
pub struct PlaybackDriver<S, R> {
    inner: Arc<DriverInner<S, R>>,
}

impl<S, R> Clone for PlaybackDriver<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: FrameSource, R: FrameRenderer> PlaybackDriver<S, R> {
    /// Create a stopped driver positioned on frame 1.
    pub fn new(loader: FrameLoader<S>, renderer: R, fps: f64, settings: PlaybackSettings) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                loader,
                renderer,
                fps,
                settings,
                state: Mutex::new(DriverState {
                    current_frame: 1,
                    playing: false,
                    cancel: None,
                }),
            }),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state().playing
    }

    pub fn current_frame(&self) -> FrameNumber {
        self.inner.state().current_frame
    }

    /// Begin playing from the current frame. No-op while already playing.
    pub fn start(&self) {
        let token = {
            let mut state = self.inner.state();
            if state.playing {
                return;
            }
            let token = CancellationToken::new();
            state.playing = true;
            state.cancel = Some(token.clone());
            token
        };

        tracing::debug!(frame = self.current_frame(), "Playback started");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(token).await });
    }

    /// Stop playing. The current frame is kept.
    pub fn stop(&self) {
        let mut state = self.inner.state();
        state.playing = false;
        if let Some(token) = state.cancel.take() {
            token.cancel();
            tracing::debug!(frame = state.current_frame, "Playback stopped");
        }
    }

    /// Move to `frame`, clamped to the video, without rendering. The next
    /// [`start`](Self::start) plays from there. Returns the clamped frame, or
    /// `None` for an empty video.
    pub fn set_current_frame(&self, frame: FrameNumber) -> Option<FrameNumber> {
        let total = self.inner.loader.total_frames();
        if total == 0 {
            return None;
        }
        let target = frame.clamp(1, total);
        self.inner.state().current_frame = target;
        Some(target)
    }

    /// Jump to `frame`, clamped to the video, and render it. Playback, if
    /// running, continues from there.
    pub async fn seek(&self, frame: FrameNumber) {
        let Some(target) = self.set_current_frame(frame) else {
            return;
        };

        if let Some(image) = self.inner.frame_image(target).await {
            if self.current_frame() == target {
                self.inner.renderer.render(target, image);
            }
        }
        self.inner.renderer.refresh_details(target);
        self.inner.loader.preload_after(target);
    }
}

impl<S: FrameSource, R: FrameRenderer> DriverInner<S, R> {
    fn state(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn frame_image(&self, frame: FrameNumber) -> Option<FrameImage> {
        match self.loader.get(frame) {
            Some(image) => Some(image),
            None => self.loader.load_immediate(frame).await,
        }
    }

    fn delay_after(&self, frame: FrameNumber) -> Duration {
        let compensation = if self.settings.adaptive {
            compensation_factor(self.loader.consecutive_cached_after(frame, COMPENSATION_WINDOW))
        } else {
            1.0
        };
        frame_delay(self.fps, self.settings.speed, compensation)
    }

    async fn run(&self, token: CancellationToken) {
        loop {
            let frame = self.state().current_frame;
            let image = self.frame_image(frame).await;
            if token.is_cancelled() {
                return;
            }

            match image {
                Some(image) => self.renderer.render(frame, image),
                None => tracing::warn!(frame, "Frame unavailable, skipping render"),
            }
            self.renderer.refresh_details(frame);
            self.loader.preload_after(frame);
            let delay = self.delay_after(frame);

            {
                let mut state = self.state();
                if token.is_cancelled() {
                    return;
                }
                if state.current_frame >= self.loader.total_frames() {
                    state.playing = false;
                    state.cancel = None;
                    tracing::debug!(frame = state.current_frame, "Playback reached last frame");
                    return;
                }
                state.current_frame += 1;
            }

            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
