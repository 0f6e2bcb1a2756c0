use async_trait::async_trait;
use dashmap::DashMap;

use curio_core::{MetadataPatch, MetadataUri, Token, TokenQuery};
use curio_tokens::{TokenStore, TokenStoreError};

/// In-memory [`TokenStore`] backed by a [`DashMap`].
///
/// Each token occupies one slot keyed by its contract, index, and offer /
/// offer-pool placement. Queries evaluate the addressing predicate through
/// [`TokenQuery::matches`], so the predicate semantics stay identical to the
/// SQL backend's branch arms.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, Token>,
}

/// Render the unique slot key for a token record.
fn slot_key(token: &Token) -> String {
    let placement = match (&token.offer, token.offer_pool) {
        (Some(offer), _) => format!("offer:{offer}"),
        (None, Some(pool)) => format!("pool:{pool}"),
        (None, None) => "unplaced".to_owned(),
    };
    format!("{}:{}:{placement}", token.contract, token.index)
}

impl MemoryTokenStore {
    /// Create a new, empty in-memory token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a token record, replacing any record in the same slot.
    pub fn insert(&self, token: Token) {
        self.tokens.insert(slot_key(&token), token);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Find the slot key of the first record matching the query.
    fn matching_key(&self, query: &TokenQuery) -> Option<String> {
        self.tokens
            .iter()
            .find_map(|entry| query.matches(entry.value()).then(|| entry.key().clone()))
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_one(&self, query: &TokenQuery) -> Result<Option<Token>, TokenStoreError> {
        Ok(self
            .matching_key(query)
            .and_then(|key| self.tokens.get(&key).map(|entry| entry.value().clone())))
    }

    async fn find_one_and_update(
        &self,
        query: &TokenQuery,
        patch: &MetadataPatch,
    ) -> Result<Option<Token>, TokenStoreError> {
        let Some(key) = self.matching_key(query) else {
            return Ok(None);
        };
        let Some(mut entry) = self.tokens.get_mut(&key) else {
            return Ok(None);
        };
        patch.apply_to(&mut entry.metadata);
        Ok(Some(entry.value().clone()))
    }

    async fn set_metadata_uri(
        &self,
        query: &TokenQuery,
        uri: &MetadataUri,
    ) -> Result<bool, TokenStoreError> {
        let Some(key) = self.matching_key(query) else {
            return Ok(false);
        };
        let Some(mut entry) = self.tokens.get_mut(&key) else {
            return Ok(false);
        };
        entry.metadata_uri = uri.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use curio_core::{AddressingScheme, sanitize_edit};
    use serde_json::json;

    use super::*;

    fn offer_query(active: Vec<&str>) -> TokenQuery {
        TokenQuery {
            contract: "c1".into(),
            index: 7.into(),
            addressing: AddressingScheme::ByOffer(
                active.into_iter().map(Into::into).collect(),
            ),
        }
    }

    fn pool_query(pool: u64) -> TokenQuery {
        TokenQuery {
            contract: "c1".into(),
            index: 7.into(),
            addressing: AddressingScheme::ByOfferPool(pool.into()),
        }
    }

    #[tokio::test]
    async fn find_one_resolves_by_offer_membership() {
        let store = MemoryTokenStore::new();
        assert!(store.is_empty());
        store.insert(Token::in_offer("c1", 7u64, "offer-2"));
        assert_eq!(store.len(), 1);

        let found = store.find_one(&offer_query(vec!["offer-1", "offer-2"])).await.unwrap();
        assert!(found.is_some());

        let missed = store.find_one(&offer_query(vec!["offer-9"])).await.unwrap();
        assert!(missed.is_none());
    }

    #[tokio::test]
    async fn find_one_resolves_by_offer_pool() {
        let store = MemoryTokenStore::new();
        store.insert(Token::in_pool("c1", 7u64, 3u64));

        assert!(store.find_one(&pool_query(3)).await.unwrap().is_some());
        assert!(store.find_one(&pool_query(4)).await.unwrap().is_none());
        // The offer predicate must never see pooled tokens.
        assert!(
            store
                .find_one(&offer_query(vec!["offer-1"]))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn find_one_and_update_returns_the_merged_record() {
        let store = MemoryTokenStore::new();
        store.insert(Token::in_pool("c1", 7u64, 3u64));

        let raw = json!({"name": "Cat"});
        let patch = sanitize_edit(raw.as_object().unwrap(), &[]).unwrap();
        let updated = store
            .find_one_and_update(&pool_query(3), &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.metadata.name.as_deref(), Some("Cat"));

        let absent = store.find_one_and_update(&pool_query(9), &patch).await.unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn set_metadata_uri_updates_the_pointer() {
        let store = MemoryTokenStore::new();
        store.insert(Token::in_pool("c1", 7u64, 3u64));

        let uri = MetadataUri::parse("https://gw.example/QmNew");
        assert!(store.set_metadata_uri(&pool_query(3), &uri).await.unwrap());

        let token = store.find_one(&pool_query(3)).await.unwrap().unwrap();
        assert_eq!(token.metadata_uri, uri);

        assert!(!store.set_metadata_uri(&pool_query(9), &uri).await.unwrap());
    }
}
