use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Identifier of a marketplace contract record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of one active offer on a diamond contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl OfferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OfferId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Marketplace catalog index of an offer pool on a standard pooled contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferPoolIndex(u64);

impl OfferPoolIndex {
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OfferPoolIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for OfferPoolIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

/// A deployed contract that owns tokens on the marketplace.
///
/// The `diamond` flag selects how the contract's tokens are addressed: diamond
/// (multi-facet) contracts address tokens through their currently active
/// offers, standard contracts through a single offer-pool catalog index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    /// Address authorized to edit and publish this contract's token metadata.
    pub owner: Address,
    /// Whether this is a diamond (multi-facet) contract.
    pub diamond: bool,
}

impl Contract {
    pub fn new(id: impl Into<ContractId>, owner: impl Into<Address>, diamond: bool) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            diamond,
        }
    }
}

impl From<String> for ContractId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<String> for OfferId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
