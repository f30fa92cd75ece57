use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capture::{Frame, SnapshotSource};
use crate::pipeline::{CacheStats, CameraCache, Fetcher};

struct Camera {
    cache: Arc<CameraCache>,
    fetcher: Arc<Fetcher>,
}

/// Registry of every configured camera's cache and fetcher.
///
/// Built once at startup and shared by handle; cameras are never added or
/// removed afterwards.
pub struct FrameManager {
    cameras: BTreeMap<String, Camera>,
}

impl FrameManager {
    /// `cameras` maps camera name to snapshot URL
    pub fn new(
        cameras: &BTreeMap<String, String>,
        source: Arc<dyn SnapshotSource>,
        capacity: usize,
    ) -> Self {
        let cameras = cameras
            .iter()
            .map(|(name, url)| {
                let camera = Camera {
                    cache: Arc::new(CameraCache::new(capacity)),
                    fetcher: Arc::new(Fetcher::new(name.as_str(), url.as_str(), source.clone())),
                };
                (name.clone(), camera)
            })
            .collect();

        Self { cameras }
    }

    pub fn camera_names(&self) -> impl Iterator<Item = &str> {
        self.cameras.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn cache(&self, camera: &str) -> Option<&Arc<CameraCache>> {
        self.cameras.get(camera).map(|c| &c.cache)
    }

    pub fn fetcher(&self, camera: &str) -> Option<&Arc<Fetcher>> {
        self.cameras.get(camera).map(|c| &c.fetcher)
    }

    pub fn latest_frame(&self, camera: &str) -> Option<Frame> {
        self.cache(camera)?.read_latest()
    }

    pub fn next_frame(&self, camera: &str) -> Option<Frame> {
        self.cache(camera)?.read_next()
    }

    /// Start one polling task per camera, all stopped by `shutdown`
    pub fn spawn_fetchers(&self, interval: Duration, shutdown: &CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for camera in self.cameras.values() {
            tasks.spawn(camera.fetcher.clone().run(
                camera.cache.clone(),
                interval,
                shutdown.clone(),
            ));
        }
        tasks
    }

    pub fn stats(&self) -> impl Iterator<Item = (&str, CacheStats)> {
        self.cameras
            .iter()
            .map(|(name, camera)| (name.as_str(), camera.cache.stats()))
    }

    pub fn log_stats(&self) {
        for (name, stats) in self.stats() {
            info!(
                "[{}] {} frames written, {} read ({} repeats of latest)",
                name, stats.frames_written, stats.frames_read, stats.latest_fallbacks
            );
        }
    }
}
