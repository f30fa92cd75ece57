//! Error types shared across the frame pipeline

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a fetch cycle produced no frame
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Transport(#[source] BoxError),

    #[error("bad status: {0}")]
    Status(u16),

    #[error("empty body")]
    EmptyBody,

    #[error("invalid JPEG frame ({0} bytes)")]
    InvalidFrame(usize),
}

impl FetchError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        FetchError::Transport(err.into())
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::EmptyBody => "empty",
            FetchError::InvalidFrame(_) => "invalid",
        }
    }
}

/// Failure writing to a connected client
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("client disconnected")]
    Disconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Streaming unsupported")]
    FlushUnsupported,

    #[error("unknown camera: {0}")]
    UnknownCamera(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] ::config::ConfigError),

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ::toml::de::Error),

    #[error("failed to read .env file")]
    EnvFile(#[source] dotenv::Error),

    #[error("{field} must be between 1 and 1000, got {value}")]
    InvalidFps { field: &'static str, value: u32 },

    #[error("pipeline.ring_buffer_size must be at least 1")]
    EmptyRingBuffer,

    #[error("no cameras configured")]
    NoCameras,

    #[error("camera name {0:?} may only contain letters, digits, '-' and '_'")]
    InvalidCameraName(String),

    #[error("camera {0:?} differs from another camera only by letter case")]
    DuplicateCamera(String),

    #[error("camera {0:?} has no snapshot URL")]
    MissingUrl(String),
}
