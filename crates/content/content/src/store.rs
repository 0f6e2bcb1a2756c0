use async_trait::async_trait;
use bytes::Bytes;

use crate::cid::Cid;
use crate::error::ContentStoreError;

/// Client contract for a pinning service over a content-addressed network.
///
/// Implementations must be `Send + Sync` and safe for concurrent use; the
/// upload ingestor transfers independent files in parallel.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Add a binary object to the store, returning its content identifier.
    async fn add_file(&self, filename: &str, data: Bytes) -> Result<Cid, ContentStoreError>;

    /// Add a JSON metadata object to the store under a human-readable label,
    /// returning its content identifier.
    async fn add_metadata(
        &self,
        metadata: &serde_json::Value,
        label: &str,
    ) -> Result<Cid, ContentStoreError>;

    /// Pin a content identifier so the store retains its data.
    async fn add_pin(&self, cid: &Cid, label: &str) -> Result<(), ContentStoreError>;

    /// Unpin a content identifier, allowing the store to garbage-collect it.
    ///
    /// Unpinning a CID that is not pinned is a no-op, not an error, so that
    /// retiring a superseded pointer stays safe to retry.
    async fn remove_pin(&self, cid: &Cid) -> Result<(), ContentStoreError>;
}
