//! SQLite pool setup for the persistent key/value store.
//!
//! The schema holds a single `kv_store` table, created by the embedded
//! migrations. See [`crate::storage::SqliteKeyValueStore`].

pub mod time;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

/// Connection settings for the feed database.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            // Writes are a handful of small upserts per user action.
            max_connections: 2,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolSettings {
    /// Settings for `database_url`. In-memory databases are private to a
    /// connection, so they are limited to one.
    pub fn for_url(database_url: &str) -> Self {
        let mut settings = Self::default();
        if is_in_memory(database_url) {
            settings.max_connections = 1;
        }
        settings
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Open a pool for `database_url` with [`PoolSettings::for_url`].
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    init_pool_with(database_url, &PoolSettings::for_url(database_url)).await
}

pub async fn init_pool_with(
    database_url: &str,
    settings: &PoolSettings,
) -> Result<DbPool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(settings.busy_timeout)
        .create_if_missing(true);
    if !is_in_memory(database_url) {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await?;

    info!(
        max_connections = settings.max_connections,
        "Feed database pool ready"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    debug!("Applying feed database migrations");
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_urls_get_one_connection() {
        assert_eq!(PoolSettings::for_url("sqlite::memory:").max_connections, 1);
        assert_eq!(
            PoolSettings::for_url("sqlite:file:feed?mode=memory").max_connections,
            1
        );
        assert_eq!(
            PoolSettings::for_url("sqlite:feed.db?mode=rwc").max_connections,
            PoolSettings::default().max_connections
        );
    }

    #[tokio::test]
    async fn test_migrations_create_kv_table() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kv_store")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
