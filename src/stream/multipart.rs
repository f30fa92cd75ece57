//! `multipart/x-mixed-replace` framing for MJPEG over HTTP

use bytes::{BufMut, BytesMut};

pub const BOUNDARY: &str = "frame";

pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

pub const PART_CONTENT_TYPE: &str = "image/jpeg";

/// Written after each part's payload
pub const PART_TRAILER: &[u8] = b"\r\n";

/// Append the boundary line and part headers for a `len`-byte JPEG
pub fn write_part_header(buf: &mut BytesMut, len: usize) {
    buf.reserve(64);
    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_slice(b"\r\nContent-Type: ");
    buf.put_slice(PART_CONTENT_TYPE.as_bytes());
    buf.put_slice(b"\r\nContent-Length: ");
    buf.put_slice(len.to_string().as_bytes());
    buf.put_slice(b"\r\n\r\n");
}
