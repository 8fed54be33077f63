//! Frame loading: cache lookup, single-flight fetches and background preload.
//!
//! A [`FrameLoader`] is cheap to clone; clones share one cache, one set of
//! in-flight frame numbers and one preload queue. Loader state sits behind a
//! `std::sync::Mutex` that is never held across an `.await`.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::DynamicImage;
use ppe_core::types::FrameNumber;

use crate::cache::FrameCache;
use crate::client::{ViewerApi, ViewerApiError};

/// How often a second caller checks the cache while another request for
/// the same frame is in flight.
const IN_FLIGHT_POLL: Duration = Duration::from_millis(50);

/// Default number of frames preloaded ahead of the current one.
pub const DEFAULT_PRELOAD_BUFFER: u32 = 3;

/// A decoded frame, shared between the cache and renderers.
pub type FrameImage = Arc<DynamicImage>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Api(#[from] ViewerApiError),

    #[error("frame {0} is not part of the extracted sequence")]
    OutOfRange(FrameNumber),

    #[error("failed to decode frame image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("decode task failed: {0}")]
    Join(String),
}

/// Where encoded frame bytes come from.
pub trait FrameSource: Send + Sync + 'static {
    fn fetch(
        &self,
        frame: FrameNumber,
    ) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;
}

/// How an [`HttpFrameSource`] addresses frames, chosen once per video.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMode {
    /// Pre-extracted sequence: frame `n` is `listing[n - 1]`.
    Sequence(Vec<String>),
    /// One ffmpeg extraction per request.
    OnDemand,
}

/// Frame source backed by the viewer API.
pub struct HttpFrameSource {
    api: ViewerApi,
    video_id: String,
    mode: SourceMode,
}

impl HttpFrameSource {
    /// Pick the source for `video_id`: the extracted sequence when the
    /// server lists one, otherwise on-demand extraction.
    pub async fn for_video(api: ViewerApi, video_id: &str) -> Self {
        let mode = match api.list_frames(video_id).await {
            Ok(Some(frames)) if !frames.is_empty() => {
                tracing::info!(video_id, frames = frames.len(), "Using extracted frame sequence");
                SourceMode::Sequence(frames)
            }
            Ok(_) => {
                tracing::info!(video_id, "No extracted frames, using on-demand extraction");
                SourceMode::OnDemand
            }
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Frame listing failed, using on-demand extraction");
                SourceMode::OnDemand
            }
        };
        Self::with_mode(api, video_id, mode)
    }

    pub fn with_mode(api: ViewerApi, video_id: &str, mode: SourceMode) -> Self {
        Self {
            api,
            video_id: video_id.to_string(),
            mode,
        }
    }

    pub fn mode(&self) -> &SourceMode {
        &self.mode
    }
}

impl FrameSource for HttpFrameSource {
    async fn fetch(&self, frame: FrameNumber) -> Result<Vec<u8>, LoadError> {
        match &self.mode {
            SourceMode::Sequence(frames) => {
                let name = frame
                    .checked_sub(1)
                    .and_then(|i| frames.get(i as usize))
                    .ok_or(LoadError::OutOfRange(frame))?;
                Ok(self.api.fetch_sequence_frame(&self.video_id, name).await?)
            }
            SourceMode::OnDemand => Ok(self.api.fetch_frame(&self.video_id, frame).await?),
        }
    }
}

struct LoaderState {
    cache: FrameCache<FrameImage>,
    in_flight: HashSet<FrameNumber>,
    queue: VecDeque<FrameNumber>,
    worker_running: bool,
}

struct LoaderInner<S> {
    source: S,
    state: Mutex<LoaderState>,
    preload_buffer: u32,
    total_frames: u32,
}

/// Resolves frame numbers to decoded images for one video.
pub struct FrameLoader<S> {
    inner: Arc<LoaderInner<S>>,
}

impl<S> Clone for FrameLoader<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Claim {
    Cached(FrameImage),
    Wait,
    Fetch,
}

impl<S: FrameSource> FrameLoader<S> {
    pub fn new(source: S, cache_capacity: usize, preload_buffer: u32, total_frames: u32) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                source,
                state: Mutex::new(LoaderState {
                    cache: FrameCache::new(cache_capacity),
                    in_flight: HashSet::new(),
                    queue: VecDeque::new(),
                    worker_running: false,
                }),
                preload_buffer,
                total_frames,
            }),
        }
    }

    pub fn total_frames(&self) -> u32 {
        self.inner.total_frames
    }

    /// Cached image for `frame`, without fetching.
    pub fn get(&self, frame: FrameNumber) -> Option<FrameImage> {
        self.inner.state().cache.get(frame).cloned()
    }

    pub fn is_cached(&self, frame: FrameNumber) -> bool {
        self.inner.state().cache.contains(frame)
    }

    /// Number of frames directly after `frame` that are cached without a
    /// gap, looking at most `window` frames ahead.
    pub fn consecutive_cached_after(&self, frame: FrameNumber, window: u32) -> u32 {
        let state = self.inner.state();
        (1..=window)
            .take_while(|i| state.cache.contains(frame.saturating_add(*i)))
            .count() as u32
    }

    /// Load `frame` now, from cache or the source. Always resolves; a failed
    /// fetch yields `None`.
    ///
    /// If the frame is already being fetched, this waits for that request
    /// instead of issuing a second one.
    pub async fn load_immediate(&self, frame: FrameNumber) -> Option<FrameImage> {
        let claim = {
            let mut state = self.inner.state();
            if let Some(image) = state.cache.get(frame) {
                Claim::Cached(Arc::clone(image))
            } else if state.in_flight.contains(&frame) {
                Claim::Wait
            } else {
                state.in_flight.insert(frame);
                Claim::Fetch
            }
        };

        match claim {
            Claim::Cached(image) => Some(image),
            Claim::Wait => self.wait_for_in_flight(frame).await,
            Claim::Fetch => self.inner.fetch_and_store(frame).await,
        }
    }

    async fn wait_for_in_flight(&self, frame: FrameNumber) -> Option<FrameImage> {
        loop {
            tokio::time::sleep(IN_FLIGHT_POLL).await;
            let state = self.inner.state();
            if let Some(image) = state.cache.get(frame) {
                return Some(Arc::clone(image));
            }
            if !state.in_flight.contains(&frame) {
                return None;
            }
        }
    }

    /// Queue up to `preload_buffer` frames after `current` for background
    /// loading. Frames past the end, already cached, queued or in flight
    /// are skipped. Never blocks.
    pub fn preload_after(&self, current: FrameNumber) {
        let spawn_worker = {
            let mut state = self.inner.state();
            for offset in 1..=self.inner.preload_buffer {
                let next = current.saturating_add(offset);
                if next > self.inner.total_frames
                    || state.cache.contains(next)
                    || state.in_flight.contains(&next)
                    || state.queue.contains(&next)
                {
                    continue;
                }
                state.queue.push_back(next);
            }
            let spawn = !state.worker_running && !state.queue.is_empty();
            if spawn {
                state.worker_running = true;
            }
            spawn
        };

        if spawn_worker {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_preload_queue().await });
        }
    }

    /// Drop all cached frames and pending preloads.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.cache.clear();
        state.queue.clear();
    }
}

/// Removes `frame` from the in-flight set when dropped.
struct InFlightGuard<'a, S> {
    inner: &'a LoaderInner<S>,
    frame: FrameNumber,
}

impl<S> Drop for InFlightGuard<'_, S> {
    fn drop(&mut self) {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.frame);
    }
}

impl<S: FrameSource> LoaderInner<S> {
    fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch, decode and cache a frame the caller has already marked in flight.
    /// The mark is cleared even if this future is dropped mid-fetch.
    async fn fetch_and_store(&self, frame: FrameNumber) -> Option<FrameImage> {
        let _guard = InFlightGuard { inner: self, frame };
        match self.fetch_decoded(frame).await {
            Ok(image) => {
                self.state().cache.insert(frame, Arc::clone(&image));
                Some(image)
            }
            Err(e) => {
                tracing::warn!(frame, error = %e, "Failed to load frame");
                None
            }
        }
    }

    async fn fetch_decoded(&self, frame: FrameNumber) -> Result<FrameImage, LoadError> {
        let bytes = self.source.fetch(frame).await?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| LoadError::Join(e.to_string()))??;
        tracing::debug!(frame, width = image.width(), height = image.height(), "Frame decoded");
        Ok(Arc::new(image))
    }

    /// Single background worker: load queued frames one at a time until the
    /// queue is empty.
    async fn run_preload_queue(&self) {
        while let Some(frame) = self.next_queued() {
            self.fetch_and_store(frame).await;
        }
    }

    /// Pop the next frame worth fetching and mark it in flight. Clears the
    /// worker flag when the queue runs dry.
    fn next_queued(&self) -> Option<FrameNumber> {
        let mut state = self.state();
        while let Some(frame) = state.queue.pop_front() {
            if state.cache.contains(frame) || state.in_flight.contains(&frame) {
                continue;
            }
            state.in_flight.insert(frame);
            return Some(frame);
        }
        state.worker_running = false;
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    /// Counts fetches per frame; frames in `failing` return an error.
    struct CountingSource {
        calls: Arc<Mutex<Vec<FrameNumber>>>,
        delay: Duration,
        failing: Vec<FrameNumber>,
        png: Vec<u8>,
    }

    impl CountingSource {
        fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<FrameNumber>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let source = Self {
                calls: Arc::clone(&calls),
                delay,
                failing: Vec::new(),
                png: png_bytes(),
            };
            (source, calls)
        }
    }

    impl FrameSource for CountingSource {
        async fn fetch(&self, frame: FrameNumber) -> Result<Vec<u8>, LoadError> {
            self.calls.lock().unwrap().push(frame);
            tokio::time::sleep(self.delay).await;
            if self.failing.contains(&frame) {
                return Err(LoadError::OutOfRange(frame));
            }
            Ok(self.png.clone())
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let (source, calls) = CountingSource::new(Duration::from_millis(120));
        let loader = FrameLoader::new(source, 50, 3, 100);

        let (a, b) = tokio::join!(loader.load_immediate(7), loader.load_immediate(7));

        let a = a.expect("first caller gets the frame");
        let b = b.expect("second caller gets the frame");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*calls.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn failed_fetch_resolves_none_for_all_waiters() {
        let (mut source, calls) = CountingSource::new(Duration::from_millis(80));
        source.failing = vec![4];
        let loader = FrameLoader::new(source, 50, 3, 100);

        let (a, b) = tokio::join!(loader.load_immediate(4), loader.load_immediate(4));

        assert!(a.is_none());
        assert!(b.is_none());
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(!loader.is_cached(4));
    }

    #[tokio::test]
    async fn dropped_load_releases_frame_for_retry() {
        let (source, calls) = CountingSource::new(Duration::from_millis(100));
        let loader = FrameLoader::new(source, 50, 3, 100);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), loader.load_immediate(7)).await;
        assert!(abandoned.is_err());

        let image = tokio::time::timeout(Duration::from_secs(2), loader.load_immediate(7))
            .await
            .expect("retry is not stuck waiting on the abandoned fetch");
        assert!(image.is_some());
        assert!(loader.is_cached(7));
        assert_eq!(*calls.lock().unwrap(), vec![7, 7]);
    }

    #[tokio::test]
    async fn preload_fetches_frame_after_dropped_load() {
        let (source, calls) = CountingSource::new(Duration::from_millis(100));
        let loader = FrameLoader::new(source, 50, 1, 100);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), loader.load_immediate(7)).await;
        assert!(abandoned.is_err());

        loader.preload_after(6);
        wait_until(|| loader.is_cached(7)).await;
        assert_eq!(*calls.lock().unwrap(), vec![7, 7]);
    }

    #[tokio::test]
    async fn cached_frame_is_not_refetched() {
        let (source, calls) = CountingSource::new(Duration::ZERO);
        let loader = FrameLoader::new(source, 50, 3, 100);

        assert!(loader.load_immediate(2).await.is_some());
        assert!(loader.get(2).is_some());
        assert!(loader.load_immediate(2).await.is_some());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preload_fetches_upcoming_frames_within_total() {
        let (source, calls) = CountingSource::new(Duration::ZERO);
        let loader = FrameLoader::new(source, 50, 3, 10);

        loader.preload_after(8);
        wait_until(|| loader.is_cached(9) && loader.is_cached(10)).await;

        let mut fetched = calls.lock().unwrap().clone();
        fetched.sort_unstable();
        assert_eq!(fetched, vec![9, 10]);
    }

    #[tokio::test]
    async fn preload_skips_cached_frames() {
        let (source, calls) = CountingSource::new(Duration::ZERO);
        let loader = FrameLoader::new(source, 50, 3, 100);
        loader.load_immediate(2).await;

        loader.preload_after(1);
        wait_until(|| loader.is_cached(3) && loader.is_cached(4)).await;

        assert_eq!(*calls.lock().unwrap(), vec![2, 3, 4]);
        assert_eq!(loader.consecutive_cached_after(1, 5), 3);
        assert_eq!(loader.consecutive_cached_after(0, 5), 0);
    }

    #[tokio::test]
    async fn immediate_load_waits_for_preload_in_flight() {
        let (source, calls) = CountingSource::new(Duration::from_millis(100));
        let loader = FrameLoader::new(source, 50, 1, 100);

        loader.preload_after(4);
        wait_until(|| !calls.lock().unwrap().is_empty()).await;

        assert!(loader.load_immediate(5).await.is_some());
        assert_eq!(*calls.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn sequence_source_maps_frame_to_listing_index() {
        let api = ViewerApi::new("http://127.0.0.1:9/api/v1").unwrap();
        let source = HttpFrameSource::with_mode(
            api,
            "ward",
            SourceMode::Sequence(vec!["00001.png".into(), "00002.png".into()]),
        );

        assert!(matches!(source.fetch(0).await, Err(LoadError::OutOfRange(0))));
        assert!(matches!(source.fetch(3).await, Err(LoadError::OutOfRange(3))));
    }

    #[test]
    fn clear_drops_cache() {
        let (source, _) = CountingSource::new(Duration::ZERO);
        let loader = FrameLoader::new(source, 50, 3, 100);
        loader
            .inner
            .state()
            .cache
            .insert(1, Arc::new(DynamicImage::new_rgb8(1, 1)));
        assert!(loader.is_cached(1));

        loader.clear();
        assert!(!loader.is_cached(1));
    }
}
