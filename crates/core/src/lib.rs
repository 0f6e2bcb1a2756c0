pub mod address;
pub mod addressing;
pub mod contract;
pub mod metadata;
pub mod sanitize;
pub mod token;

pub use address::Address;
pub use addressing::{AddressingError, AddressingScheme, RequestScope, TokenQuery};
pub use contract::{Contract, ContractId, OfferId, OfferPoolIndex};
pub use metadata::{MetadataUri, TokenMetadata, TraitAttribute};
pub use sanitize::{
    IngestedUpload, MetadataField, MetadataPatch, SanitizeError, purify, sanitize_edit,
};
pub use token::{Token, TokenIndex};
