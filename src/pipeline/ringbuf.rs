//! Per-camera frame ring with overwrite-on-full and catch-up-to-latest reads

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::RwLock;

use crate::capture::Frame;

/// Fixed-capacity ring of frames for one camera.
///
/// One writer advances the write index; readers advance either the shared
/// read index ([`read_next`](Self::read_next)) or their own
/// [`ReadCursor`]. The writer never waits for readers: a reader that falls a
/// full lap behind silently skips the overwritten frames.
pub struct CameraCache {
    ring: RwLock<Ring>,

    /// Statistics
    stats: CachePadded<Stats>,
}

struct Ring {
    slots: Box<[Option<Frame>]>,
    write_index: usize,
    read_index: usize,
}

#[derive(Default)]
struct Stats {
    frames_written: AtomicU64,
    frames_read: AtomicU64,
    latest_fallbacks: AtomicU64,
}

/// Snapshot of a cache's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub frames_written: u64,
    pub frames_read: u64,
    /// Reads answered with the latest frame because the reader had caught up
    pub latest_fallbacks: u64,
}

/// A reader's private position in one [`CameraCache`]
#[derive(Debug, Clone)]
pub struct ReadCursor {
    index: usize,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn latest(&self) -> Option<Frame> {
        let cap = self.capacity();
        self.slots[(self.write_index + cap - 1) % cap].clone()
    }

    /// Returns the frame and whether it was the latest-frame fallback
    fn next(&self, index: &mut usize) -> (Option<Frame>, bool) {
        if *index == self.write_index {
            return (self.latest(), true);
        }
        let frame = self.slots[*index].clone();
        *index = (*index + 1) % self.capacity();
        (frame, false)
    }
}

impl CameraCache {
    /// # Panics
    /// If `capacity` is zero; configuration validation rejects that earlier.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be at least 1");
        Self {
            ring: RwLock::new(Ring {
                slots: vec![None; capacity].into_boxed_slice(),
                write_index: 0,
                read_index: 0,
            }),
            stats: CachePadded::new(Stats::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }

    /// Producer: store `frame` in the current slot, overwriting whatever was there
    pub fn write(&self, frame: Frame) {
        let mut ring = self.ring.write();
        let index = ring.write_index;
        ring.slots[index] = Some(frame);
        ring.write_index = (index + 1) % ring.capacity();
        drop(ring);

        self.stats.frames_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Most recently written frame, `None` until the first write
    pub fn read_latest(&self) -> Option<Frame> {
        self.ring.read().latest()
    }

    /// Consumer: next unread frame on the shared read index.
    ///
    /// Once the reader has caught up with the writer this keeps returning the
    /// latest frame without advancing.
    pub fn read_next(&self) -> Option<Frame> {
        let mut ring = self.ring.write();
        let mut index = ring.read_index;
        let (frame, fallback) = ring.next(&mut index);
        ring.read_index = index;
        drop(ring);

        self.record_read(&frame, fallback);
        frame
    }

    /// A private cursor positioned at the writer, so its first read is the latest frame
    pub fn cursor(&self) -> ReadCursor {
        ReadCursor {
            index: self.ring.read().write_index,
        }
    }

    /// Same policy as [`read_next`](Self::read_next), advancing `cursor` instead of the shared index
    pub fn read_next_with(&self, cursor: &mut ReadCursor) -> Option<Frame> {
        let ring = self.ring.read();
        cursor.index %= ring.capacity();
        let (frame, fallback) = ring.next(&mut cursor.index);
        drop(ring);

        self.record_read(&frame, fallback);
        frame
    }

    fn record_read(&self, frame: &Option<Frame>, fallback: bool) {
        if frame.is_some() {
            self.stats.frames_read.fetch_add(1, Ordering::Relaxed);
            if fallback {
                self.stats.latest_fallbacks.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            frames_written: self.stats.frames_written.load(Ordering::Relaxed),
            frames_read: self.stats.frames_read.load(Ordering::Relaxed),
            latest_fallbacks: self.stats.latest_fallbacks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Frame {
        Frame::from_body(&sequence.to_be_bytes(), sequence)
    }

    fn seq(frame: Option<Frame>) -> Option<u64> {
        frame.map(|f| f.sequence)
    }

    #[test]
    fn empty_cache_has_no_frame() {
        let cache = CameraCache::new(10);
        assert!(cache.read_latest().is_none());
        assert!(cache.read_next().is_none());
        let mut cursor = cache.cursor();
        assert!(cache.read_next_with(&mut cursor).is_none());
        assert_eq!(cache.stats().frames_read, 0);
    }

    #[test]
    fn latest_is_last_written_for_every_capacity() {
        for capacity in 1..=12 {
            for k in 1..=capacity as u64 {
                let cache = CameraCache::new(capacity);
                for s in 1..=k {
                    cache.write(frame(s));
                }
                assert_eq!(seq(cache.read_latest()), Some(k), "capacity {capacity}, k {k}");
            }
        }
    }

    #[test]
    fn read_next_drains_then_falls_back_to_latest() {
        let cache = CameraCache::new(10);
        for s in 1..=4 {
            cache.write(frame(s));
        }

        let drained: Vec<_> = (0..4).map(|_| seq(cache.read_next())).collect();
        assert_eq!(drained, vec![Some(1), Some(2), Some(3), Some(4)]);

        for _ in 0..3 {
            assert_eq!(seq(cache.read_next()), Some(4));
        }
        let stats = cache.stats();
        assert_eq!(stats.frames_read, 7);
        assert_eq!(stats.latest_fallbacks, 3);

        cache.write(frame(5));
        assert_eq!(seq(cache.read_next()), Some(5));
    }

    #[test]
    fn read_latest_does_not_move_read_index() {
        let cache = CameraCache::new(4);
        cache.write(frame(1));
        cache.write(frame(2));
        assert_eq!(seq(cache.read_latest()), Some(2));
        assert_eq!(seq(cache.read_next()), Some(1));
    }

    #[test]
    fn wraparound_overwrites_first_slot() {
        let capacity = 10;
        let cache = CameraCache::new(capacity);
        for s in 1..=capacity as u64 + 1 {
            cache.write(frame(s));
        }

        assert_eq!(seq(cache.read_latest()), Some(11));
        // Slot 0 now holds frame 11; frame 1 is gone.
        let mut seen = Vec::new();
        for _ in 0..capacity + 2 {
            seen.push(seq(cache.read_next()).unwrap());
        }
        assert!(!seen.contains(&1));
        assert_eq!(seen[0], 11);
    }

    #[test]
    fn capacity_one_always_serves_latest() {
        let cache = CameraCache::new(1);
        cache.write(frame(1));
        assert_eq!(seq(cache.read_next()), Some(1));
        cache.write(frame(2));
        assert_eq!(seq(cache.read_next()), Some(2));
        assert_eq!(seq(cache.read_next()), Some(2));
    }

    #[test]
    fn cursors_are_independent() {
        let cache = CameraCache::new(10);
        cache.write(frame(1));

        let mut a = cache.cursor();
        let mut b = cache.cursor();
        assert_eq!(seq(cache.read_next_with(&mut a)), Some(1));

        cache.write(frame(2));
        cache.write(frame(3));
        assert_eq!(seq(cache.read_next_with(&mut a)), Some(2));
        assert_eq!(seq(cache.read_next_with(&mut a)), Some(3));
        assert_eq!(seq(cache.read_next_with(&mut b)), Some(2));

        // Shared index is untouched by cursor reads
        assert_eq!(seq(cache.read_next()), Some(1));
    }

    #[test]
    fn lapped_reader_never_goes_backwards() {
        let cache = CameraCache::new(4);
        let mut cursor = cache.cursor();
        let mut last = 0;
        let mut next = 1;
        for round in 0..50 {
            // Writer bursts between 0 and 9 frames per read
            for _ in 0..(round * 7) % 10 {
                cache.write(frame(next));
                next += 1;
            }
            if let Some(f) = cache.read_next_with(&mut cursor) {
                assert!(f.sequence >= last, "{} after {}", f.sequence, last);
                last = f.sequence;
            }
        }
    }
}
