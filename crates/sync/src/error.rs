use thiserror::Error;

use curio_content::ContentStoreError;
use curio_core::addressing::AddressingError;
use curio_core::sanitize::SanitizeError;
use curio_core::token::TokenIndex;
use curio_tokens::TokenStoreError;

/// Errors surfaced by the token metadata synchronization operations.
///
/// The first four variants are the caller-facing outcomes; their `Display`
/// strings are the user-visible messages. The remaining variants wrap
/// failures of the underlying resources and carry no internal detail beyond
/// their message.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No token matches the addressing predicate.
    #[error("Token not found.")]
    NotFound,

    /// The caller is not the owning contract's owner.
    #[error("You have no permissions for updating token {token}.")]
    Forbidden { token: TokenIndex },

    /// The edit payload had no allow-listed fields after filtering.
    #[error("Nothing to update.")]
    NothingToUpdate,

    /// Publish attempted on a token that does not exist on-chain yet.
    #[error("Token not minted.")]
    NotMinted,

    /// The content store rejected the new metadata object or its pin.
    #[error("content store error: {0}")]
    Content(#[from] ContentStoreError),

    /// Token record store failure.
    #[error("token store error: {0}")]
    Tokens(#[from] TokenStoreError),

    /// Failed to serialize the metadata document.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem failure outside the per-file recovery path.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SanitizeError> for SyncError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::NothingToUpdate => Self::NothingToUpdate,
        }
    }
}

impl From<AddressingError> for SyncError {
    fn from(err: AddressingError) -> Self {
        // A scope that cannot produce an addressing predicate cannot match
        // any token.
        match err {
            AddressingError::MissingOfferPool => Self::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        assert_eq!(SyncError::NotFound.to_string(), "Token not found.");
        assert_eq!(
            SyncError::Forbidden { token: 7.into() }.to_string(),
            "You have no permissions for updating token 7."
        );
        assert_eq!(SyncError::NothingToUpdate.to_string(), "Nothing to update.");
        assert_eq!(SyncError::NotMinted.to_string(), "Token not minted.");
    }
}
