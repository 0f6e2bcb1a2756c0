use thiserror::Error;

use crate::contract::{Contract, ContractId, OfferId, OfferPoolIndex};
use crate::token::{Token, TokenIndex};

/// Failure to derive an addressing scheme from a request scope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressingError {
    /// A standard pooled contract was addressed without an offer-pool index.
    #[error("pooled contract scope is missing an offer pool index")]
    MissingOfferPool,
}

/// How a token is located within its owning contract.
///
/// Resolved once per request from the contract's topology and threaded
/// through both the read and the write path, so the two can never apply
/// different predicates for the same request. Diamond contracts address by
/// membership in the currently active offer set; standard contracts by the
/// offer-pool catalog index. The variants are mutually exclusive by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingScheme {
    /// Diamond contracts: the token sits in one of the active offers.
    ByOffer(Vec<OfferId>),
    /// Standard contracts: the token sits in the browsed offer pool.
    ByOfferPool(OfferPoolIndex),
}

impl AddressingScheme {
    /// Derive the scheme for a request scope from its contract's topology.
    pub fn for_scope(scope: &RequestScope) -> Result<Self, AddressingError> {
        if scope.contract.diamond {
            Ok(Self::ByOffer(scope.active_offers.clone()))
        } else {
            scope
                .offer_pool
                .map(Self::ByOfferPool)
                .ok_or(AddressingError::MissingOfferPool)
        }
    }
}

/// What the transport layer resolves before handing a request to the core:
/// the owning contract record plus the offer context the caller is browsing.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub contract: Contract,
    pub token: TokenIndex,
    /// Offers currently active for the contract (diamond addressing).
    pub active_offers: Vec<OfferId>,
    /// Catalog index of the offer pool being browsed (pooled addressing).
    pub offer_pool: Option<OfferPoolIndex>,
}

impl RequestScope {
    /// Scope for a diamond contract request.
    pub fn diamond(
        contract: Contract,
        token: impl Into<TokenIndex>,
        active_offers: Vec<OfferId>,
    ) -> Self {
        Self {
            contract,
            token: token.into(),
            active_offers,
            offer_pool: None,
        }
    }

    /// Scope for a standard pooled contract request.
    pub fn pooled(
        contract: Contract,
        token: impl Into<TokenIndex>,
        offer_pool: impl Into<OfferPoolIndex>,
    ) -> Self {
        Self {
            contract,
            token: token.into(),
            active_offers: Vec::new(),
            offer_pool: Some(offer_pool.into()),
        }
    }
}

/// The single addressing predicate every token-store operation is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenQuery {
    pub contract: ContractId,
    pub index: TokenIndex,
    pub addressing: AddressingScheme,
}

impl TokenQuery {
    /// Build the query for a request scope, resolving the addressing scheme.
    pub fn from_scope(scope: &RequestScope) -> Result<Self, AddressingError> {
        Ok(Self {
            contract: scope.contract.id.clone(),
            index: scope.token,
            addressing: AddressingScheme::for_scope(scope)?,
        })
    }

    /// Whether a token record satisfies this query's addressing predicate.
    ///
    /// This is the one place the predicate is spelled out; in-memory stores
    /// evaluate it directly and SQL stores translate it branch for branch.
    pub fn matches(&self, token: &Token) -> bool {
        if token.contract != self.contract || token.index != self.index {
            return false;
        }
        match &self.addressing {
            AddressingScheme::ByOffer(active) => token
                .offer
                .as_ref()
                .is_some_and(|offer| active.contains(offer)),
            AddressingScheme::ByOfferPool(pool) => {
                token.offer_pool.is_some_and(|candidate| candidate == *pool)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond_contract() -> Contract {
        Contract::new("c-diamond", "0xa", true)
    }

    fn pooled_contract() -> Contract {
        Contract::new("c-pooled", "0xa", false)
    }

    #[test]
    fn diamond_scope_addresses_by_offer() {
        let scope = RequestScope::diamond(diamond_contract(), 7, vec!["offer-1".into()]);
        let scheme = AddressingScheme::for_scope(&scope).unwrap();
        assert_eq!(scheme, AddressingScheme::ByOffer(vec!["offer-1".into()]));
    }

    #[test]
    fn pooled_scope_addresses_by_offer_pool() {
        let scope = RequestScope::pooled(pooled_contract(), 7, 3);
        let scheme = AddressingScheme::for_scope(&scope).unwrap();
        assert_eq!(scheme, AddressingScheme::ByOfferPool(3.into()));
    }

    #[test]
    fn pooled_scope_without_pool_index_is_rejected() {
        let scope = RequestScope {
            contract: pooled_contract(),
            token: 7.into(),
            active_offers: vec!["offer-1".into()],
            offer_pool: None,
        };
        assert_eq!(
            AddressingScheme::for_scope(&scope),
            Err(AddressingError::MissingOfferPool)
        );
    }

    #[test]
    fn offer_predicate_never_matches_pooled_tokens() {
        // Mutual exclusivity: a diamond query cannot resolve a token that is
        // slotted into an offer pool, even with identical contract and index.
        let pooled_token = Token::in_pool("c-diamond", 7u64, 3u64);
        let query = TokenQuery {
            contract: "c-diamond".into(),
            index: 7.into(),
            addressing: AddressingScheme::ByOffer(vec!["offer-1".into()]),
        };
        assert!(!query.matches(&pooled_token));
    }

    #[test]
    fn pool_predicate_never_matches_offer_tokens() {
        let offer_token = Token::in_offer("c-pooled", 7u64, "offer-1");
        let query = TokenQuery {
            contract: "c-pooled".into(),
            index: 7.into(),
            addressing: AddressingScheme::ByOfferPool(3.into()),
        };
        assert!(!query.matches(&offer_token));
    }

    #[test]
    fn offer_predicate_requires_active_membership() {
        let token = Token::in_offer("c-diamond", 7u64, "offer-9");
        let query = TokenQuery {
            contract: "c-diamond".into(),
            index: 7.into(),
            addressing: AddressingScheme::ByOffer(vec!["offer-1".into(), "offer-2".into()]),
        };
        assert!(!query.matches(&token));

        let active = Token::in_offer("c-diamond", 7u64, "offer-2");
        assert!(query.matches(&active));
    }
}
