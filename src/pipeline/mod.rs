pub mod fetcher;
pub mod manager;
pub mod ringbuf;

pub use fetcher::Fetcher;
pub use manager::FrameManager;
pub use ringbuf::{CacheStats, CameraCache, ReadCursor};
