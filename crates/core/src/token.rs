use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contract::{ContractId, OfferId, OfferPoolIndex};
use crate::metadata::{MetadataUri, TokenMetadata};

/// Position of a token within its owning contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenIndex(u64);

impl TokenIndex {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for TokenIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

/// One minted-or-mintable NFT record.
///
/// Exactly one of `offer` / `offer_pool` is populated, depending on the
/// owning contract's topology: diamond contracts place tokens in offers,
/// standard contracts in an offer pool. Store queries must never mix the two
/// predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub contract: ContractId,
    pub index: TokenIndex,
    /// Offer the token belongs to (diamond contracts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<OfferId>,
    /// Offer-pool catalog index (standard contracts only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_pool: Option<OfferPoolIndex>,
    /// Whether the token exists on-chain yet.
    #[serde(default)]
    pub is_minted: bool,
    #[serde(default)]
    pub metadata: TokenMetadata,
    #[serde(default)]
    pub metadata_uri: MetadataUri,
}

impl Token {
    /// A token slotted into a diamond contract offer.
    pub fn in_offer(
        contract: impl Into<ContractId>,
        index: impl Into<TokenIndex>,
        offer: impl Into<OfferId>,
    ) -> Self {
        Self {
            contract: contract.into(),
            index: index.into(),
            offer: Some(offer.into()),
            offer_pool: None,
            is_minted: false,
            metadata: TokenMetadata::default(),
            metadata_uri: MetadataUri::None,
        }
    }

    /// A token slotted into a standard contract's offer pool.
    pub fn in_pool(
        contract: impl Into<ContractId>,
        index: impl Into<TokenIndex>,
        offer_pool: impl Into<OfferPoolIndex>,
    ) -> Self {
        Self {
            contract: contract.into(),
            index: index.into(),
            offer: None,
            offer_pool: Some(offer_pool.into()),
            is_minted: false,
            metadata: TokenMetadata::default(),
            metadata_uri: MetadataUri::None,
        }
    }
}
