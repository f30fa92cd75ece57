pub mod http;
pub mod multipart;
pub mod server;
pub mod sink;

pub use http::{router, AppState};
pub use server::{StreamEnd, StreamServer, StreamSettings};
pub use sink::{ChannelSink, FrameSink};
