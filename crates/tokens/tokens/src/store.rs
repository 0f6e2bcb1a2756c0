use async_trait::async_trait;

use curio_core::{MetadataPatch, MetadataUri, Token, TokenQuery};

use crate::error::TokenStoreError;

/// Trait for persisting token records.
///
/// Every operation is keyed by a [`TokenQuery`], whose addressing scheme was
/// resolved exactly once per request: implementations evaluate the offer
/// predicate *or* the offer-pool predicate, never both. Implementations must
/// be `Send + Sync` and safe for concurrent access; concurrent edits to the
/// same token are last-writer-wins.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Find the single token matching the addressing predicate.
    async fn find_one(&self, query: &TokenQuery) -> Result<Option<Token>, TokenStoreError>;

    /// Atomically merge a sanitized metadata patch into the matching token
    /// and return the post-update record. Returns `None` when no token
    /// matched.
    async fn find_one_and_update(
        &self,
        query: &TokenQuery,
        patch: &MetadataPatch,
    ) -> Result<Option<Token>, TokenStoreError>;

    /// Persist a token's published metadata pointer. Returns `true` when a
    /// token matched.
    async fn set_metadata_uri(
        &self,
        query: &TokenQuery,
        uri: &MetadataUri,
    ) -> Result<bool, TokenStoreError>;
}
