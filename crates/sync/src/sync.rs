use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use curio_content::{Cid, ContentStore};
use curio_core::{Address, MetadataUri, RequestScope, Token, TokenQuery};
use curio_tokens::TokenStore;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::ingest::UploadIngestor;
use crate::upload::{StagedUpload, UploadBatch};

/// The token metadata synchronization service.
///
/// Coordinates the token record store, the local staging area for uploads,
/// and the external content-addressed store: resolving which token a request
/// refers to, applying authorized and sanitized edits, and keeping the
/// published metadata pointer consistent with local state.
pub struct TokenSync {
    tokens: Arc<dyn TokenStore>,
    content: Arc<dyn ContentStore>,
    ingestor: UploadIngestor,
    config: SyncConfig,
}

impl TokenSync {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        content: Arc<dyn ContentStore>,
        config: SyncConfig,
    ) -> Self {
        let ingestor = UploadIngestor::new(Arc::clone(&content), config.gateway_base());
        Self {
            tokens,
            content,
            ingestor,
            config,
        }
    }

    /// Look up the single token a request scope refers to.
    #[instrument(
        name = "sync.get_token",
        skip(self, scope),
        fields(contract = %scope.contract.id, token = %scope.token)
    )]
    pub async fn get_token(&self, scope: &RequestScope) -> Result<Token, SyncError> {
        let query = TokenQuery::from_scope(scope)?;
        self.tokens
            .find_one(&query)
            .await?
            .ok_or(SyncError::NotFound)
    }

    /// Apply an authorized, sanitized metadata edit together with its
    /// uploaded files.
    ///
    /// Whatever the outcome -- not found, forbidden, nothing to update,
    /// store failure, or success -- every staged upload is removed from
    /// local storage before this returns.
    #[instrument(
        name = "sync.update_metadata",
        skip(self, scope, caller, edit, uploads),
        fields(contract = %scope.contract.id, token = %scope.token, caller = %caller)
    )]
    pub async fn update_token_metadata(
        &self,
        scope: &RequestScope,
        caller: &Address,
        edit: &serde_json::Map<String, Value>,
        uploads: Vec<StagedUpload>,
    ) -> Result<Token, SyncError> {
        let batch = UploadBatch::new(uploads);
        let result = self.update_inner(scope, caller, edit, batch.files()).await;
        // Cleanup runs on every exit path; the ingestor already removed the
        // files it processed, discard sweeps up the rest.
        batch.discard().await;
        result
    }

    async fn update_inner(
        &self,
        scope: &RequestScope,
        caller: &Address,
        edit: &serde_json::Map<String, Value>,
        files: &[StagedUpload],
    ) -> Result<Token, SyncError> {
        // The addressing scheme is resolved once and reused at persist time,
        // so the read and write paths can never disagree.
        let query = TokenQuery::from_scope(scope)?;

        if self.tokens.find_one(&query).await?.is_none() {
            return Err(SyncError::NotFound);
        }

        if *caller != scope.contract.owner {
            return Err(SyncError::Forbidden { token: scope.token });
        }

        let files = if files.len() > self.config.max_uploads {
            warn!(
                count = files.len(),
                limit = self.config.max_uploads,
                "upload count over policy; extra files ignored"
            );
            &files[..self.config.max_uploads]
        } else {
            files
        };

        let ingested = self.ingestor.ingest(files).await;
        let patch = curio_core::sanitize_edit(edit, &ingested)?;

        self.tokens
            .find_one_and_update(&query, &patch)
            .await?
            .ok_or(SyncError::NotFound)
    }

    /// Publish the token's current metadata to content-addressed storage and
    /// retire the previous pointer.
    ///
    /// Pins a fresh metadata object even when the content is byte-identical
    /// to the last publish, then issues a best-effort unpin for the previous
    /// pointer's content. The two store calls are independent: a failed
    /// unpin never blocks the publish, and a failed pin does not stop the
    /// unpin attempt (both outcomes are logged for reconciliation).
    #[instrument(
        name = "sync.publish_metadata",
        skip(self, scope, caller),
        fields(contract = %scope.contract.id, token = %scope.token, caller = %caller)
    )]
    pub async fn publish_token_metadata(
        &self,
        scope: &RequestScope,
        caller: &Address,
    ) -> Result<MetadataUri, SyncError> {
        if *caller != scope.contract.owner {
            return Err(SyncError::Forbidden { token: scope.token });
        }

        let query = TokenQuery::from_scope(scope)?;
        let token = self
            .tokens
            .find_one(&query)
            .await?
            .ok_or(SyncError::NotFound)?;

        if !token.is_minted {
            return Err(SyncError::NotMinted);
        }

        let previous = token.metadata_uri.clone();
        let pinned = if token.metadata.is_empty() {
            Ok(MetadataUri::None)
        } else {
            self.pin_current(&token).await
        };

        self.retire_previous(&previous).await;

        let metadata_uri = pinned?;
        if !self.tokens.set_metadata_uri(&query, &metadata_uri).await? {
            return Err(SyncError::NotFound);
        }

        info!(uri = %metadata_uri, "metadata pointer published");
        Ok(metadata_uri)
    }

    /// Serialize and pin the token's current metadata, returning the new
    /// pointer.
    async fn pin_current(&self, token: &Token) -> Result<MetadataUri, SyncError> {
        let label = token.metadata.display_name().to_owned();
        let document = serde_json::to_value(&token.metadata)
            .map_err(|err| SyncError::Serialization(err.to_string()))?;

        let cid = self.content.add_metadata(&document, &label).await?;
        self.content
            .add_pin(&cid, &format!("metadata_{label}"))
            .await?;

        info!(%cid, "metadata pinned");
        Ok(MetadataUri::Url(format!(
            "{}/{cid}",
            self.config.gateway_base()
        )))
    }

    /// Best-effort unpin of the previous pointer's content. Pointers that
    /// are not content-addressed URLs are left alone; failures are logged
    /// and never fail the publish.
    async fn retire_previous(&self, previous: &MetadataUri) {
        let Some(cid) = previous.cid() else {
            return;
        };
        let cid = Cid::from(cid);
        match self.content.remove_pin(&cid).await {
            Ok(()) => info!(%cid, "previous metadata unpinned"),
            Err(err) => warn!(%cid, error = %err, "failed to unpin previous metadata"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use curio_content_memory::MemoryContentStore;
    use curio_core::{Contract, TokenMetadata};
    use curio_tokens_memory::MemoryTokenStore;

    use super::*;

    struct Fixture {
        tokens: Arc<MemoryTokenStore>,
        content: Arc<MemoryContentStore>,
        sync: TokenSync,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let tokens = Arc::new(MemoryTokenStore::new());
        let content = Arc::new(MemoryContentStore::new());
        let sync = TokenSync::new(
            tokens.clone(),
            content.clone(),
            SyncConfig {
                gateway: "https://gw.example/ipfs".into(),
                ..SyncConfig::default()
            },
        );
        Fixture {
            tokens,
            content,
            sync,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn pooled_contract(owner: &str) -> Contract {
        Contract::new("c-pooled", owner, false)
    }

    fn diamond_contract(owner: &str) -> Contract {
        Contract::new("c-diamond", owner, true)
    }

    fn pooled_scope(owner: &str) -> RequestScope {
        RequestScope::pooled(pooled_contract(owner), 7, 3)
    }

    async fn stage(fx: &Fixture, name: &str) -> StagedUpload {
        let path = fx.dir.path().join(name);
        tokio::fs::write(&path, b"bytes").await.unwrap();
        StagedUpload::new(name, path)
    }

    fn edit(value: serde_json::Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn stored_token(fx: &Fixture, scope: &RequestScope) -> Token {
        fx.sync.get_token(scope).await.unwrap()
    }

    #[tokio::test]
    async fn get_token_resolves_diamond_contracts_by_active_offers() {
        let fx = fixture();
        fx.tokens.insert(Token::in_offer("c-diamond", 7u64, "offer-2"));

        let scope = RequestScope::diamond(
            diamond_contract("0xa"),
            7,
            vec!["offer-1".into(), "offer-2".into()],
        );
        assert!(fx.sync.get_token(&scope).await.is_ok());

        let inactive = RequestScope::diamond(diamond_contract("0xa"), 7, vec!["offer-9".into()]);
        assert!(matches!(
            fx.sync.get_token(&inactive).await,
            Err(SyncError::NotFound)
        ));
    }

    #[tokio::test]
    async fn get_token_resolves_pooled_contracts_by_pool_index() {
        let fx = fixture();
        fx.tokens.insert(Token::in_pool("c-pooled", 7u64, 3u64));

        assert!(fx.sync.get_token(&pooled_scope("0xa")).await.is_ok());

        let wrong_pool = RequestScope::pooled(pooled_contract("0xa"), 7, 4);
        assert!(matches!(
            fx.sync.get_token(&wrong_pool).await,
            Err(SyncError::NotFound)
        ));
    }

    #[tokio::test]
    async fn owner_edit_sanitizes_text_and_substitutes_the_image_link() {
        let fx = fixture();
        fx.tokens.insert(Token::in_pool("c-pooled", 7u64, 3u64));
        let scope = pooled_scope("0xa");
        let upload = stage(&fx, "cat.png").await;
        let temp_path = upload.path.clone();

        let updated = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xA"),
                &edit(json!({"name": "<script>x</script>Cat", "image": "cat.png"})),
                vec![upload],
            )
            .await
            .unwrap();

        assert_eq!(updated.metadata.name.as_deref(), Some("Cat"));
        let image = updated.metadata.image.unwrap();
        assert!(image.starts_with("https://gw.example/ipfs/"));
        assert!(image.ends_with("/cat.png"));
        assert!(!temp_path.exists(), "temp file must be removed");
    }

    #[tokio::test]
    async fn non_owner_edit_is_forbidden_with_zero_writes_and_cleanup() {
        let fx = fixture();
        let mut token = Token::in_pool("c-pooled", 7u64, 3u64);
        token.metadata.name = Some("Before".into());
        fx.tokens.insert(token);
        let scope = pooled_scope("0xa");
        let upload = stage(&fx, "cat.png").await;
        let temp_path = upload.path.clone();

        let err = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xb"),
                &edit(json!({"name": "After"})),
                vec![upload],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Forbidden { .. }));
        assert!(!temp_path.exists(), "temp file must be removed");
        assert_eq!(fx.content.add_file_calls(), 0);
        let token = stored_token(&fx, &scope).await;
        assert_eq!(token.metadata.name.as_deref(), Some("Before"));
    }

    #[tokio::test]
    async fn junk_only_edit_is_nothing_to_update_with_zero_writes() {
        let fx = fixture();
        let mut token = Token::in_pool("c-pooled", 7u64, 3u64);
        token.metadata.name = Some("Before".into());
        fx.tokens.insert(token);
        let scope = pooled_scope("0xa");
        let upload = stage(&fx, "cat.png").await;
        let temp_path = upload.path.clone();

        let err = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xa"),
                &edit(json!({"isMinted": true, "owner": "0xb"})),
                vec![upload],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NothingToUpdate));
        assert!(!temp_path.exists(), "temp file must be removed");
        let token = stored_token(&fx, &scope).await;
        assert_eq!(token.metadata.name.as_deref(), Some("Before"));
    }

    #[tokio::test]
    async fn unknown_token_aborts_with_not_found_and_cleans_up() {
        let fx = fixture();
        let scope = pooled_scope("0xa");
        let upload = stage(&fx, "cat.png").await;
        let temp_path = upload.path.clone();

        let err = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xa"),
                &edit(json!({"name": "Cat"})),
                vec![upload],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotFound));
        assert!(!temp_path.exists(), "temp file must be removed");
    }

    #[tokio::test]
    async fn image_naming_a_missing_file_leaves_the_field_unchanged() {
        let fx = fixture();
        let mut token = Token::in_pool("c-pooled", 7u64, 3u64);
        token.metadata.image = Some("https://gw.example/ipfs/QmOld/old.png".into());
        fx.tokens.insert(token);
        let scope = pooled_scope("0xa");

        let updated = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xa"),
                &edit(json!({"name": "Cat", "image": "never-uploaded.png"})),
                Vec::new(),
            )
            .await
            .unwrap();

        assert_eq!(updated.metadata.name.as_deref(), Some("Cat"));
        assert_eq!(
            updated.metadata.image.as_deref(),
            Some("https://gw.example/ipfs/QmOld/old.png"),
            "a filename that never arrived must not be persisted"
        );
    }

    #[tokio::test]
    async fn failed_transfer_drops_the_image_but_applies_the_rest() {
        let fx = fixture();
        let mut token = Token::in_pool("c-pooled", 7u64, 3u64);
        token.metadata.image = Some("untouched.png".into());
        fx.tokens.insert(token);
        fx.content.fail_file("cat.png");
        let scope = pooled_scope("0xa");
        let upload = stage(&fx, "cat.png").await;
        let temp_path = upload.path.clone();

        let updated = fx
            .sync
            .update_token_metadata(
                &scope,
                &Address::new("0xa"),
                &edit(json!({"name": "Cat", "image": "cat.png"})),
                vec![upload],
            )
            .await
            .unwrap();

        assert_eq!(updated.metadata.name.as_deref(), Some("Cat"));
        assert_eq!(updated.metadata.image.as_deref(), Some("untouched.png"));
        assert!(!temp_path.exists(), "temp file must be removed");
    }

    fn minted_token(metadata: TokenMetadata, uri: &str) -> Token {
        let mut token = Token::in_pool("c-pooled", 7u64, 3u64);
        token.is_minted = true;
        token.metadata = metadata;
        token.metadata_uri = MetadataUri::parse(uri);
        token
    }

    #[tokio::test]
    async fn publish_pins_current_metadata_and_retires_the_old_pointer() {
        let fx = fixture();
        let metadata = TokenMetadata {
            name: Some("Cat".into()),
            ..TokenMetadata::default()
        };
        fx.tokens
            .insert(minted_token(metadata, "https://gw.example/ipfs/QmOld"));
        let scope = pooled_scope("0xa");

        let uri = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap();

        let MetadataUri::Url(url) = &uri else {
            panic!("expected a published URL")
        };
        assert!(url.starts_with("https://gw.example/ipfs/"));
        assert_eq!(fx.content.add_metadata_calls(), 1);
        assert_eq!(fx.content.unpin_log(), vec![Cid::from("QmOld")]);

        let token = stored_token(&fx, &scope).await;
        assert_eq!(token.metadata_uri, uri);
    }

    #[tokio::test]
    async fn publish_with_empty_metadata_sets_none_but_still_unpins() {
        let fx = fixture();
        fx.tokens.insert(minted_token(
            TokenMetadata::default(),
            "https://gw.example/ipfs/QmOld",
        ));
        let scope = pooled_scope("0xa");

        let uri = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap();

        assert_eq!(uri, MetadataUri::None);
        assert_eq!(fx.content.add_metadata_calls(), 0);
        assert_eq!(fx.content.add_pin_calls(), 0);
        assert_eq!(fx.content.unpin_log(), vec![Cid::from("QmOld")]);

        let token = stored_token(&fx, &scope).await;
        assert_eq!(token.metadata_uri, MetadataUri::None);
    }

    #[tokio::test]
    async fn double_publish_mints_two_pins_and_unpins_successively_older_cids() {
        let fx = fixture();
        let metadata = TokenMetadata {
            name: Some("Cat".into()),
            ..TokenMetadata::default()
        };
        fx.tokens
            .insert(minted_token(metadata, "https://gw.example/ipfs/QmOld"));
        let scope = pooled_scope("0xa");
        let caller = Address::new("0xa");

        let first = fx
            .sync
            .publish_token_metadata(&scope, &caller)
            .await
            .unwrap();
        let second = fx
            .sync
            .publish_token_metadata(&scope, &caller)
            .await
            .unwrap();

        assert_ne!(first, second, "identical metadata still gets a fresh pin");
        assert_eq!(fx.content.add_metadata_calls(), 2);

        let first_cid = Cid::from(first.cid().unwrap());
        assert_eq!(
            fx.content.unpin_log(),
            vec![Cid::from("QmOld"), first_cid],
            "each publish retires the pointer it superseded"
        );
    }

    #[tokio::test]
    async fn publish_of_an_unminted_token_makes_no_store_calls() {
        let fx = fixture();
        fx.tokens.insert(Token::in_pool("c-pooled", 7u64, 3u64));
        let scope = pooled_scope("0xa");

        let err = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::NotMinted));
        assert_eq!(fx.content.add_metadata_calls(), 0);
        assert_eq!(fx.content.add_pin_calls(), 0);
        assert!(fx.content.unpin_log().is_empty());
    }

    #[tokio::test]
    async fn publish_by_a_non_owner_is_forbidden_before_any_lookup() {
        let fx = fixture();
        fx.tokens.insert(minted_token(
            TokenMetadata::default(),
            "https://gw.example/ipfs/QmOld",
        ));
        let scope = pooled_scope("0xa");

        let err = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xb"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Forbidden { .. }));
        assert!(fx.content.unpin_log().is_empty());

        let token = stored_token(&fx, &scope).await;
        assert_eq!(
            token.metadata_uri,
            MetadataUri::parse("https://gw.example/ipfs/QmOld")
        );
    }

    #[tokio::test]
    async fn a_failed_unpin_never_blocks_the_publish() {
        let fx = fixture();
        let metadata = TokenMetadata {
            name: Some("Cat".into()),
            ..TokenMetadata::default()
        };
        fx.tokens
            .insert(minted_token(metadata, "https://gw.example/ipfs/QmOld"));
        fx.content.fail_unpins();
        let scope = pooled_scope("0xa");

        let uri = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap();

        assert!(matches!(uri, MetadataUri::Url(_)));
        assert_eq!(
            fx.content.unpin_log(),
            vec![Cid::from("QmOld")],
            "the unpin was attempted despite failing"
        );

        let token = stored_token(&fx, &scope).await;
        assert_eq!(token.metadata_uri, uri, "the new pointer still persists");
    }

    #[tokio::test]
    async fn a_failed_pin_still_attempts_the_unpin_but_keeps_the_old_pointer() {
        let fx = fixture();
        let metadata = TokenMetadata {
            name: Some("Cat".into()),
            ..TokenMetadata::default()
        };
        fx.tokens
            .insert(minted_token(metadata, "https://gw.example/ipfs/QmOld"));
        fx.content.fail_metadata();
        let scope = pooled_scope("0xa");

        let err = fx
            .sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Content(_)));
        assert_eq!(
            fx.content.unpin_log(),
            vec![Cid::from("QmOld")],
            "pin and unpin are independent; the unpin still ran"
        );

        let token = stored_token(&fx, &scope).await;
        assert_eq!(
            token.metadata_uri,
            MetadataUri::parse("https://gw.example/ipfs/QmOld"),
            "the pointer is only rewritten after a successful pin"
        );
    }

    #[tokio::test]
    async fn publish_after_never_publishing_skips_the_unpin() {
        let fx = fixture();
        let metadata = TokenMetadata {
            name: Some("Cat".into()),
            ..TokenMetadata::default()
        };
        fx.tokens.insert(minted_token(metadata, "none"));
        let scope = pooled_scope("0xa");

        fx.sync
            .publish_token_metadata(&scope, &Address::new("0xa"))
            .await
            .unwrap();

        assert!(fx.content.unpin_log().is_empty());
    }

    #[tokio::test]
    async fn uploads_beyond_the_policy_cap_are_ignored_but_cleaned_up() {
        let fx = fixture();
        fx.tokens.insert(Token::in_pool("c-pooled", 7u64, 3u64));
        let scope = pooled_scope("0xa");

        let a = stage(&fx, "a.png").await;
        let b = stage(&fx, "b.png").await;
        let c = stage(&fx, "c.png").await;
        let paths = [a.path.clone(), b.path.clone(), c.path.clone()];

        fx.sync
            .update_token_metadata(
                &scope,
                &Address::new("0xa"),
                &edit(json!({"image": "c.png"})),
                vec![a, b, c],
            )
            .await
            .unwrap();

        assert_eq!(fx.content.add_file_calls(), 2, "cap is two files");
        for path in &paths {
            assert!(!path.exists(), "every temp file must be removed");
        }
    }
}
