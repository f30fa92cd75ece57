use bytes::Bytes;
use std::time::Instant;

/// One validated camera snapshot.
///
/// Frames are never mutated after construction, so readers clone them out of
/// the cache (a reference count bump on `data`) and release the lock immediately.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG payload, owned independently of the response it came from
    pub data: Bytes,

    /// Capture timestamp for staleness tracking
    pub timestamp: Instant,

    /// Per-camera fetch counter, starting at 1
    pub sequence: u64,
}

impl Frame {
    /// Copy `body` into a new frame stamped with the current time
    pub fn from_body(body: &[u8], sequence: u64) -> Self {
        Self {
            data: Bytes::copy_from_slice(body),
            timestamp: Instant::now(),
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_body_copies_payload() {
        let body = bytes::Bytes::from_static(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        let frame = Frame::from_body(&body, 7);
        assert_eq!(frame.data, body);
        assert_ne!(frame.data.as_ptr(), body.as_ptr());
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.len(), 7);
    }
}
