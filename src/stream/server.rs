//! Per-client MJPEG emission loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::Frame;
use crate::error::{SinkError, StreamError};
use crate::pipeline::{CameraCache, Fetcher, ReadCursor};
use crate::stream::multipart;
use crate::stream::sink::FrameSink;
use crate::utils::frame_interval;
use crate::PipelineConfig;

/// Cadence of one stream
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Pause after each emitted frame
    pub serve_interval: Duration,
    /// Pause when the cache has never been written
    pub no_frame_backoff: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            serve_interval: frame_interval(config.serve_fps),
            no_frame_backoff: Duration::from_millis(config.no_frame_backoff_ms),
        }
    }
}

/// Why a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Disconnected,
    Shutdown,
    WriteFailed,
}

enum FrameFeed {
    Cached {
        cache: Arc<CameraCache>,
        cursor: ReadCursor,
    },
    Direct(Arc<Fetcher>),
}

/// Emits frames for one connected client until it disconnects.
pub struct StreamServer {
    camera: String,
    feed: FrameFeed,
    settings: StreamSettings,
    shutdown: CancellationToken,
    header: BytesMut,
    frames_sent: u64,
}

impl StreamServer {
    /// Serve from the camera's cache with a private read cursor
    pub fn cached(
        camera: impl Into<String>,
        cache: Arc<CameraCache>,
        settings: StreamSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let cursor = cache.cursor();
        Self::with_feed(camera.into(), FrameFeed::Cached { cache, cursor }, settings, shutdown)
    }

    /// Fetch a fresh snapshot for every frame
    pub fn direct(fetcher: Arc<Fetcher>, settings: StreamSettings, shutdown: CancellationToken) -> Self {
        let camera = fetcher.camera().to_string();
        Self::with_feed(camera, FrameFeed::Direct(fetcher), settings, shutdown)
    }

    fn with_feed(
        camera: String,
        feed: FrameFeed,
        settings: StreamSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            camera,
            feed,
            settings,
            shutdown,
            header: BytesMut::with_capacity(128),
            frames_sent: 0,
        }
    }

    /// Check that `sink` can carry a stream and return the loop to spawn.
    ///
    /// Fails before anything is written, so the caller can still answer with an error status.
    pub fn begin<S>(self, sink: S) -> Result<impl Future<Output = StreamEnd> + Send, StreamError>
    where
        S: FrameSink + 'static,
    {
        if !sink.supports_flush() {
            return Err(StreamError::FlushUnsupported);
        }
        Ok(self.run(sink))
    }

    async fn run<S: FrameSink>(mut self, mut sink: S) -> StreamEnd {
        info!("[{}] client connected", self.camera);
        let shutdown = self.shutdown.clone();

        let end = loop {
            if let Some(end) = self.stop_reason(&sink) {
                break end;
            }

            let frame = match self.next_frame(&sink).await {
                Ok(Some(frame)) => frame,
                Err(end) => break end,
                Ok(None) => {
                    let delay = self.retry_delay();
                    match self.pause(&sink, delay).await {
                        Some(end) => break end,
                        None => continue,
                    }
                }
            };

            let sent = tokio::select! {
                res = self.emit(&mut sink, &frame) => res,
                _ = shutdown.cancelled() => break StreamEnd::Shutdown,
            };
            if let Err(e) = sent {
                break match e {
                    SinkError::Disconnected => StreamEnd::Disconnected,
                    SinkError::Io(e) => {
                        warn!("[{}] write error: {}", self.camera, e);
                        StreamEnd::WriteFailed
                    }
                };
            }

            if let Some(end) = self.pause(&sink, self.settings.serve_interval).await {
                break end;
            }
        };

        match end {
            StreamEnd::Disconnected => info!("[{}] client disconnected", self.camera),
            _ => info!("[{}] stream closed ({:?})", self.camera, end),
        }
        debug!("[{}] {} frames sent", self.camera, self.frames_sent);
        end
    }

    fn stop_reason<S: FrameSink>(&self, sink: &S) -> Option<StreamEnd> {
        if sink.is_disconnected() {
            Some(StreamEnd::Disconnected)
        } else if self.shutdown.is_cancelled() {
            Some(StreamEnd::Shutdown)
        } else {
            None
        }
    }

    /// Sleep for `duration`, cut short by disconnect or shutdown
    async fn pause<S: FrameSink>(&self, sink: &S, duration: Duration) -> Option<StreamEnd> {
        tokio::select! {
            _ = sink.disconnected() => Some(StreamEnd::Disconnected),
            _ = self.shutdown.cancelled() => Some(StreamEnd::Shutdown),
            _ = tokio::time::sleep(duration) => None,
        }
    }

    /// A live fetch is abandoned as soon as the client leaves or shutdown starts
    async fn next_frame<S: FrameSink>(&mut self, sink: &S) -> Result<Option<Frame>, StreamEnd> {
        match &mut self.feed {
            FrameFeed::Cached { cache, cursor } => Ok(cache.read_next_with(cursor)),
            FrameFeed::Direct(fetcher) => tokio::select! {
                _ = sink.disconnected() => Err(StreamEnd::Disconnected),
                _ = self.shutdown.cancelled() => Err(StreamEnd::Shutdown),
                res = fetcher.fetch_frame() => match res {
                    Ok(frame) => Ok(Some(frame)),
                    Err(e) => {
                        fetcher.report(&e);
                        Ok(None)
                    }
                },
            },
        }
    }

    fn retry_delay(&self) -> Duration {
        match self.feed {
            FrameFeed::Cached { .. } => self.settings.no_frame_backoff,
            FrameFeed::Direct(_) => self.settings.serve_interval,
        }
    }

    async fn emit<S: FrameSink>(&mut self, sink: &mut S, frame: &Frame) -> Result<(), SinkError> {
        self.header.clear();
        multipart::write_part_header(&mut self.header, frame.len());

        sink.write(&self.header).await?;
        sink.write(&frame.data).await?;
        sink.write(multipart::PART_TRAILER).await?;
        sink.flush().await?;

        self.frames_sent += 1;
        metrics::counter!("frames_served", "camera" => self.camera.clone()).increment(1);
        Ok(())
    }
}
