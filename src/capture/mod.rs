pub mod frame;
pub mod http;
pub mod source;
pub mod validate;

pub use frame::Frame;
pub use http::HttpSnapshotClient;
pub use source::{Snapshot, SnapshotSource};
pub use validate::is_valid_frame;
