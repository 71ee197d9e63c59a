pub mod gcs;
pub mod signer;

pub use gcs::GcsStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// Object store adapter: opaque byte blobs under keys chosen by the file
/// service. No key validation beyond what the platform enforces.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a blob, publicly retrievable, returning its public URL.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;

    /// Delete a blob. A blob that is already gone counts as deleted.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Mint a time-limited signed retrieval URL. No network call.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String>;
}
