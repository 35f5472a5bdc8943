use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::KeyValueStore;
use crate::Result;
use crate::database::DbPool;
use crate::database::time::{ms_to_datetime, now_ms};

/// Key/value store backed by the `kv_store` table.
pub struct SqliteKeyValueStore {
    pool: DbPool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// When `key` was last written.
    pub async fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT updated_at FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(ms,)| ms_to_datetime(ms)))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};

    async fn setup_store() -> SqliteKeyValueStore {
        let pool = init_pool("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqliteKeyValueStore::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = setup_store().await;
        store.set("feed:read:7", "[\"a\"]").await.unwrap();
        store.set("feed:read:7", "[\"a\",\"b\"]").await.unwrap();

        assert_eq!(
            store.get("feed:read:7").await.unwrap().as_deref(),
            Some("[\"a\",\"b\"]")
        );
        assert!(store.updated_at("feed:read:7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = setup_store().await;
        store.remove("nope").await.unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.updated_at("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("feed.db").display());

        {
            let pool = init_pool(&url).await.unwrap();
            run_migrations(&pool).await.unwrap();
            SqliteKeyValueStore::new(pool.clone())
                .set("feed:snapshot:7", "[]")
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = init_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqliteKeyValueStore::new(pool);
        assert_eq!(
            store.get("feed:snapshot:7").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
