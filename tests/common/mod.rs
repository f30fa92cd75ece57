#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use snapstream::capture::{Snapshot, SnapshotSource};
use snapstream::error::{FetchError, SinkError};
use snapstream::stream::FrameSink;

/// Valid JPEG-framed payload carrying `tag` right after the SOI marker
pub fn jpeg(len: usize, tag: u64) -> Vec<u8> {
    let mut data = vec![0x42; len];
    data[..2].copy_from_slice(&[0xFF, 0xD8]);
    data[2..10].copy_from_slice(&tag.to_be_bytes());
    data[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
    data
}

pub fn tag_of(data: &[u8]) -> u64 {
    u64::from_be_bytes(data[2..10].try_into().unwrap())
}

/// Snapshot source driven by a closure over the 1-based call number
pub struct FnSource<F> {
    pub calls: AtomicU64,
    respond: F,
}

impl<F> FnSource<F>
where
    F: Fn(u64) -> Result<Snapshot, FetchError> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            respond,
        })
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<F> SnapshotSource for FnSource<F>
where
    F: Fn(u64) -> Result<Snapshot, FetchError> + Send + Sync,
{
    async fn get_image(&self, _url: &str) -> Result<Snapshot, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(call)
    }
}

/// Every call succeeds, tagged with its call number
pub fn always_good(call: u64) -> Result<Snapshot, FetchError> {
    Ok(Snapshot::ok(jpeg(1500, call)))
}

/// In-memory client connection; cancel `gone` to hang up
#[derive(Clone)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<u8>>>,
    pending: Vec<u8>,
    pub gone: CancellationToken,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            received: Arc::default(),
            pending: Vec::new(),
            gone: CancellationToken::new(),
        }
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
        if self.gone.is_cancelled() {
            return Err(SinkError::Disconnected);
        }
        self.pending.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.received.lock().append(&mut self.pending);
        Ok(())
    }

    fn is_disconnected(&self) -> bool {
        self.gone.is_cancelled()
    }

    async fn disconnected(&self) {
        self.gone.cancelled().await
    }
}

/// Strictly parse a multipart/x-mixed-replace body.
///
/// Returns the payloads of all complete parts; a trailing incomplete part is
/// ignored. Anything that is not a well-formed part is an error.
pub fn parse_parts(mut body: &[u8]) -> Result<Vec<Vec<u8>>, String> {
    const PREFIX: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: ";
    let mut parts = Vec::new();

    while !body.is_empty() {
        if body.len() < PREFIX.len() {
            if PREFIX.starts_with(body) {
                break;
            }
            return Err(format!("garbage at part {}", parts.len()));
        }
        if !body.starts_with(PREFIX) {
            return Err(format!("bad part header at part {}", parts.len()));
        }
        let rest = &body[PREFIX.len()..];
        let Some(end) = rest.windows(4).position(|w| w == b"\r\n\r\n") else {
            break;
        };
        let len: usize = std::str::from_utf8(&rest[..end])
            .map_err(|e| e.to_string())?
            .parse()
            .map_err(|e: std::num::ParseIntError| e.to_string())?;
        let payload_start = end + 4;
        if rest.len() < payload_start + len + 2 {
            break;
        }
        if &rest[payload_start + len..payload_start + len + 2] != b"\r\n" {
            return Err(format!("missing trailer at part {}", parts.len()));
        }
        parts.push(rest[payload_start..payload_start + len].to_vec());
        body = &rest[payload_start + len + 2..];
    }

    Ok(parts)
}
