use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let tokens_table = config.tokens_table();

    // A token sits either in a diamond contract offer or in a standard
    // contract's offer pool, never both; queries always branch on exactly
    // one of the two columns.
    let create_tokens = format!(
        "CREATE TABLE IF NOT EXISTS {tokens_table} (
            contract_id  TEXT NOT NULL,
            token_index  BIGINT NOT NULL,
            offer        TEXT,
            offer_pool   BIGINT,
            is_minted    BOOLEAN NOT NULL DEFAULT FALSE,
            metadata     JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            metadata_uri TEXT NOT NULL DEFAULT 'none'
        )"
    );

    let create_tokens_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}minted_tokens_addr_idx ON {tokens_table} (contract_id, token_index)",
        config.table_prefix
    );

    sqlx::query(&create_tokens).execute(pool).await?;
    sqlx::query(&create_tokens_idx).execute(pool).await?;

    Ok(())
}
