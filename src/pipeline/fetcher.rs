//! Snapshot polling for one camera

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::capture::{is_valid_frame, Frame, SnapshotSource};
use crate::error::FetchError;
use crate::pipeline::CameraCache;

/// Fetch-and-validate routine for one camera.
///
/// Used both by the background polling loop, which writes into the camera's
/// cache, and by uncached streams, which take the frame directly.
pub struct Fetcher {
    camera: String,
    url: String,
    source: Arc<dyn SnapshotSource>,
    sequence: AtomicU64,
}

impl Fetcher {
    pub fn new(camera: impl Into<String>, url: impl Into<String>, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            camera: camera.into(),
            url: url.into(),
            source,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    /// Pull one snapshot and turn it into a frame if it passes validation
    #[instrument(skip(self), fields(camera = %self.camera))]
    pub async fn fetch_frame(&self) -> Result<Frame, FetchError> {
        let started = Instant::now();
        let snapshot = self.source.get_image(&self.url).await?;

        if !snapshot.is_success() {
            return Err(FetchError::Status(snapshot.status));
        }
        if snapshot.body.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        if !is_valid_frame(&snapshot.body) {
            return Err(FetchError::InvalidFrame(snapshot.body.len()));
        }

        metrics::histogram!("fetch_time_us", "camera" => self.camera.clone())
            .record(started.elapsed().as_micros() as f64);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Frame::from_body(&snapshot.body, sequence))
    }

    /// One polling cycle: fetch, validate and store. Returns whether a frame was written.
    pub async fn fetch_into(&self, cache: &CameraCache) -> bool {
        match self.fetch_frame().await {
            Ok(frame) => {
                cache.write(frame);
                metrics::counter!("frames_fetched", "camera" => self.camera.clone()).increment(1);
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Log a failed cycle; none of these are fatal
    pub fn report(&self, err: &FetchError) {
        match err {
            FetchError::EmptyBody => debug!("[{}] {}", self.camera, err),
            FetchError::InvalidFrame(_) => warn!("[{}] {}, skipping", self.camera, err),
            _ => warn!("[{}] {}", self.camera, err),
        }
        metrics::counter!(
            "frames_rejected",
            "camera" => self.camera.clone(),
            "reason" => err.reason()
        )
        .increment(1);
    }

    /// Poll every `interval` until `shutdown` fires.
    ///
    /// Ticks missed during a slow fetch are skipped, and a pending
    /// cancellation wins over a pending tick.
    pub async fn run(self: Arc<Self>, cache: Arc<CameraCache>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("[{}] fetcher started ({:?} interval)", self.camera, interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.fetch_into(&cache).await;
                }
            }
        }

        info!("[{}] fetcher stopped", self.camera);
    }
}
