//! Pool setup and schema migrations.
//!
//! The benchmark table is created by the SQLx migrations under `migrations/`.
//! The load pool defaults to a single connection so the running strategy has
//! the destination to itself.

use crate::error::LoadError;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, LoadError> {
    log::debug!("connecting with up to {} connections", max_connections);
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(LoadError::Connection)
}

/// Run database migrations.
///
/// This is idempotent - migrations that have already been applied will be skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), LoadError> {
    log::info!("checking database migration state");
    MIGRATOR.run(pool).await?;
    log::info!("database migrations up to date");
    Ok(())
}
