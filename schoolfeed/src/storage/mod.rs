//! Persistent key/value port.
//!
//! Read-state sets and feed recovery snapshots are stored through
//! [`KeyValueStore`]. Two interchangeable backends exist: SQLite for durable
//! storage and an in-memory map used as a best-effort fallback. The backend is
//! picked once, at construction; the feed never branches on it.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::Result;
use crate::database;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

/// String key/value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Open the SQLite store at `database_url`, falling back to memory.
///
/// Returns the memory store directly when no URL is configured.
pub async fn open_store(database_url: Option<&str>) -> Arc<dyn KeyValueStore> {
    let Some(url) = database_url else {
        info!("No database configured, read state will not survive restarts");
        return Arc::new(MemoryKeyValueStore::new());
    };

    match open_sqlite(url).await {
        Ok(store) => {
            info!(url = %url, "Using SQLite key/value store");
            Arc::new(store)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to open SQLite store, falling back to memory");
            Arc::new(MemoryKeyValueStore::new())
        }
    }
}

async fn open_sqlite(url: &str) -> Result<SqliteKeyValueStore> {
    let pool = database::init_pool(url).await?;
    database::run_migrations(&pool).await?;
    Ok(SqliteKeyValueStore::new(pool))
}
