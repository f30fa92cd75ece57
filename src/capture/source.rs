use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;

/// Raw result of one snapshot request
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub status: u16,
    pub body: Bytes,
}

impl Snapshot {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Where snapshots come from.
///
/// Implementations return `Err` only for transport failures; HTTP status
/// codes are reported through [`Snapshot::status`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn get_image(&self, url: &str) -> Result<Snapshot, FetchError>;
}
