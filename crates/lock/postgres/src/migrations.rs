use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Create the locks table in the configured schema if it does not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if the DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let locks_table = config.locks_table();

    let create_locks = format!(
        "CREATE TABLE IF NOT EXISTS {locks_table} (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )"
    );

    let create_expiry_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}locks_expires_at_idx ON {locks_table} (expires_at)",
        config.table_prefix
    );

    sqlx::query(&create_locks).execute(pool).await?;
    sqlx::query(&create_expiry_idx).execute(pool).await?;

    Ok(())
}
