//! Cheap JPEG sanity check applied before a payload becomes a frame

/// Start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Genuine camera snapshots are never this small; anything shorter is a
/// placeholder or a truncated image.
pub const MIN_FRAME_LEN: usize = 1000;

/// Accepts a buffer that is long enough and framed by SOI/EOI markers.
///
/// Only the length and four bytes are inspected; the entropy-coded interior
/// is not decoded.
pub fn is_valid_frame(data: &[u8]) -> bool {
    if data.len() < MIN_FRAME_LEN {
        return false;
    }
    data.starts_with(&SOI) && data.ends_with(&EOI)
}
