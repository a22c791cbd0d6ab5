use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

pub mod backup;
pub mod listings;

pub use backup::{create_dump, dump_file_name};
pub use listings::{existing_urls, insert_listings, PgListingStore};

// Path relative to crates/carwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &carwatch_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("backup I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup failed with exit code {code:?}: {stderr}")]
    Backup { code: Option<i32>, stderr: String },
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool, creating `car_listings` on a
/// fresh database.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_error_mentions_exit_code_and_stderr() {
        let err = DbError::Backup {
            code: Some(1),
            stderr: "connection refused".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("Some(1)"));
        assert!(rendered.contains("connection refused"));
    }
}
