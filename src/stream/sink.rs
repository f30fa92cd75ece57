//! Byte sinks representing one connected client

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::SinkError;

/// Where a stream server writes one client's bytes.
///
/// Writes may be buffered until [`flush`](FrameSink::flush); a flushed part
/// must reach the transport without waiting for later writes.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn write(&mut self, buf: &[u8]) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Whether flushed data is delivered incrementally. Streams refuse to start otherwise.
    fn supports_flush(&self) -> bool {
        true
    }

    fn is_disconnected(&self) -> bool;

    /// Resolves once the client has gone away
    async fn disconnected(&self);
}

pub type BodyStream = ReceiverStream<Result<Bytes, io::Error>>;

/// Sink feeding an HTTP response body through a bounded channel.
///
/// Each flush becomes one body chunk. When the response body is dropped
/// (client disconnected) the channel closes and the sink reports it.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    pending: BytesMut,
}

impl ChannelSink {
    /// `depth` is the number of flushed parts that may queue ahead of the transport
    pub fn new(depth: usize) -> (Self, BodyStream) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let sink = Self {
            tx,
            pending: BytesMut::new(),
        };
        (sink, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn write(&mut self, buf: &[u8]) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Disconnected);
        }
        self.pending.extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| SinkError::Disconnected)
    }

    fn is_disconnected(&self) -> bool {
        self.tx.is_closed()
    }

    async fn disconnected(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn flush_emits_one_chunk() {
        let (mut sink, mut body) = ChannelSink::new(2);
        sink.write(b"--frame\r\n").await.unwrap();
        sink.write(b"data").await.unwrap();
        sink.flush().await.unwrap();
        sink.flush().await.unwrap();

        let chunk = body.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"--frame\r\ndata");

        drop(sink);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn dropped_body_reports_disconnect() {
        let (mut sink, body) = ChannelSink::new(1);
        assert!(!sink.is_disconnected());
        drop(body);

        assert!(sink.is_disconnected());
        sink.disconnected().await;
        assert!(matches!(sink.write(b"x").await, Err(SinkError::Disconnected)));
    }
}
