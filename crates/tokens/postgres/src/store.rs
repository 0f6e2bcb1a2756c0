use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use curio_core::{
    AddressingScheme, MetadataPatch, MetadataUri, OfferId, OfferPoolIndex, Token, TokenIndex,
    TokenQuery,
};
use curio_tokens::{TokenStore, TokenStoreError};

use crate::config::PostgresConfig;
use crate::migrations;

const TOKEN_COLUMNS: &str =
    "contract_id, token_index, offer, offer_pool, is_minted, metadata, metadata_uri";

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, TokenStoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| TokenStoreError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(TokenStoreError::Connection(format!(
                    "unknown ssl_mode: {other}"
                )));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    if let Some(ref path) = config.ssl_cert {
        options = options.ssl_client_cert(path);
    }

    if let Some(ref path) = config.ssl_key {
        options = options.ssl_client_key(path);
    }

    Ok(options)
}

/// `PostgreSQL`-backed implementation of [`TokenStore`].
///
/// Token metadata lives in a JSONB column; partial edits merge into it with
/// the `||` operator so untouched fields survive. Updates go through a
/// `ctid` subselect so that exactly one record is touched, mirroring the
/// find-one-and-update contract.
pub struct PostgresTokenStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresTokenStore {
    /// Create a new `PostgresTokenStore` from the provided configuration.
    ///
    /// Connects to `PostgreSQL`, creates the connection pool, and runs
    /// migrations to ensure the required tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`TokenStoreError::Connection`] if pool creation fails, or
    /// [`TokenStoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, TokenStoreError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| TokenStoreError::Connection(e.to_string()))?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| TokenStoreError::Backend(e.to_string()))?;

        Ok(Self { pool, config })
    }

    /// Wrap an existing pool, running migrations first.
    pub async fn with_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, TokenStoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
        Ok(Self { pool, config })
    }

    /// Seed one token record. Intended for tests and import tooling.
    pub async fn insert(&self, token: &Token) -> Result<(), TokenStoreError> {
        let sql = format!(
            "INSERT INTO {} ({TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.config.tokens_table()
        );
        let metadata = serde_json::to_value(&token.metadata)
            .map_err(|e| TokenStoreError::Serialization(e.to_string()))?;

        sqlx::query(&sql)
            .bind(token.contract.as_str())
            .bind(db_index(token.index)?)
            .bind(token.offer.as_ref().map(OfferId::as_str))
            .bind(token.offer_pool.map(db_pool_index).transpose()?)
            .bind(token.is_minted)
            .bind(metadata)
            .bind(token.metadata_uri.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

/// Convert a token index into its column representation.
fn db_index(index: TokenIndex) -> Result<i64, TokenStoreError> {
    i64::try_from(index.value())
        .map_err(|_| TokenStoreError::Backend(format!("token index {index} out of range")))
}

/// Convert an offer-pool index into its column representation.
fn db_pool_index(pool: OfferPoolIndex) -> Result<i64, TokenStoreError> {
    i64::try_from(pool.value())
        .map_err(|_| TokenStoreError::Backend(format!("offer pool index {pool} out of range")))
}

/// Render the active-offer set for an `offer = ANY($n)` bind.
fn offer_params(offers: &[OfferId]) -> Vec<String> {
    offers.iter().map(|o| o.as_str().to_owned()).collect()
}

/// Render a sanitized patch as the JSONB object merged into `metadata`.
fn patch_document(patch: &MetadataPatch) -> serde_json::Value {
    serde_json::Value::Object(
        patch
            .fields()
            .map(|(field, value)| (field.as_str().to_owned(), value.clone()))
            .collect(),
    )
}

fn token_from_row(row: &PgRow) -> Result<Token, TokenStoreError> {
    let contract_id: String = row
        .try_get("contract_id")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let token_index: i64 = row
        .try_get("token_index")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let offer: Option<String> = row
        .try_get("offer")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let offer_pool: Option<i64> = row
        .try_get("offer_pool")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let is_minted: bool = row
        .try_get("is_minted")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let metadata: serde_json::Value = row
        .try_get("metadata")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;
    let metadata_uri: String = row
        .try_get("metadata_uri")
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;

    let index = u64::try_from(token_index)
        .map_err(|_| TokenStoreError::Backend(format!("negative token index {token_index}")))?;
    let offer_pool = offer_pool
        .map(|pool| {
            u64::try_from(pool).map_err(|_| {
                TokenStoreError::Backend(format!("negative offer pool index {pool}"))
            })
        })
        .transpose()?;

    Ok(Token {
        contract: contract_id.into(),
        index: index.into(),
        offer: offer.map(Into::into),
        offer_pool: offer_pool.map(Into::into),
        is_minted,
        metadata: serde_json::from_value(metadata)
            .map_err(|e| TokenStoreError::Serialization(e.to_string()))?,
        metadata_uri: MetadataUri::parse(&metadata_uri),
    })
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn find_one(&self, query: &TokenQuery) -> Result<Option<Token>, TokenStoreError> {
        let table = self.config.tokens_table();
        let row = match &query.addressing {
            AddressingScheme::ByOffer(offers) => {
                let sql = format!(
                    "SELECT {TOKEN_COLUMNS} FROM {table}
                     WHERE contract_id = $1 AND token_index = $2 AND offer = ANY($3)
                     LIMIT 1"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(offer_params(offers))
                    .fetch_optional(&self.pool)
                    .await
            }
            AddressingScheme::ByOfferPool(pool) => {
                let sql = format!(
                    "SELECT {TOKEN_COLUMNS} FROM {table}
                     WHERE contract_id = $1 AND token_index = $2 AND offer_pool = $3
                     LIMIT 1"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(db_pool_index(*pool)?)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn find_one_and_update(
        &self,
        query: &TokenQuery,
        patch: &MetadataPatch,
    ) -> Result<Option<Token>, TokenStoreError> {
        let table = self.config.tokens_table();
        let document = patch_document(patch);

        let row = match &query.addressing {
            AddressingScheme::ByOffer(offers) => {
                let sql = format!(
                    "UPDATE {table} SET metadata = metadata || $4::jsonb
                     WHERE ctid = (
                         SELECT ctid FROM {table}
                         WHERE contract_id = $1 AND token_index = $2 AND offer = ANY($3)
                         LIMIT 1
                     )
                     RETURNING {TOKEN_COLUMNS}"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(offer_params(offers))
                    .bind(document)
                    .fetch_optional(&self.pool)
                    .await
            }
            AddressingScheme::ByOfferPool(pool) => {
                let sql = format!(
                    "UPDATE {table} SET metadata = metadata || $4::jsonb
                     WHERE ctid = (
                         SELECT ctid FROM {table}
                         WHERE contract_id = $1 AND token_index = $2 AND offer_pool = $3
                         LIMIT 1
                     )
                     RETURNING {TOKEN_COLUMNS}"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(db_pool_index(*pool)?)
                    .bind(document)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn set_metadata_uri(
        &self,
        query: &TokenQuery,
        uri: &MetadataUri,
    ) -> Result<bool, TokenStoreError> {
        let table = self.config.tokens_table();
        let result = match &query.addressing {
            AddressingScheme::ByOffer(offers) => {
                let sql = format!(
                    "UPDATE {table} SET metadata_uri = $4
                     WHERE ctid = (
                         SELECT ctid FROM {table}
                         WHERE contract_id = $1 AND token_index = $2 AND offer = ANY($3)
                         LIMIT 1
                     )"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(offer_params(offers))
                    .bind(uri.as_str())
                    .execute(&self.pool)
                    .await
            }
            AddressingScheme::ByOfferPool(pool) => {
                let sql = format!(
                    "UPDATE {table} SET metadata_uri = $4
                     WHERE ctid = (
                         SELECT ctid FROM {table}
                         WHERE contract_id = $1 AND token_index = $2 AND offer_pool = $3
                         LIMIT 1
                     )"
                );
                sqlx::query(&sql)
                    .bind(query.contract.as_str())
                    .bind(db_index(query.index)?)
                    .bind(db_pool_index(*pool)?)
                    .bind(uri.as_str())
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| TokenStoreError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
