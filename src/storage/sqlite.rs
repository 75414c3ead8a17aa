//! SQLite Persistent Address Cache
//!
//! Keeps issued deposit addresses across sessions so the gateway is asked
//! for a new address at most once per currency per device.
//! Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{AddressCache, CachedAddress, StorageError, StorageResult, CACHE_NAMESPACE};

/// SQLite-backed address cache with connection pooling
pub struct SqliteAddressCache {
    pool: Pool<SqliteConnectionManager>,
    namespace: String,
}

impl SqliteAddressCache {
    /// Open (or create) the cache at the given path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Connection(e.to_string()))?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Self::with_pool(pool)
    }

    /// Create an in-memory cache (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Self::with_pool(pool)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, StorageError> {
        let cache = Self {
            pool,
            namespace: CACHE_NAMESPACE.to_string(),
        };
        cache.run_migrations()?;
        Ok(cache)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cached_addresses (
                namespace TEXT NOT NULL,
                currency TEXT NOT NULL,
                user_id TEXT,
                address TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, currency)
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_sync(&self, currency: &str) -> StorageResult<Option<CachedAddress>> {
        let conn = self.conn()?;

        let entry = conn
            .query_row(
                "SELECT user_id, currency, address FROM cached_addresses
                 WHERE namespace = ?1 AND currency = ?2",
                params![self.namespace, currency],
                |row| {
                    Ok(CachedAddress {
                        user_id: row.get(0)?,
                        currency: row.get(1)?,
                        address: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match entry {
            Some(entry) if entry.address.is_empty() => Err(StorageError::InvalidData(format!(
                "empty address cached for {}",
                currency
            ))),
            other => Ok(other),
        }
    }

    fn put_sync(&self, entry: &CachedAddress) -> StorageResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO cached_addresses (namespace, currency, user_id, address, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(namespace, currency) DO UPDATE SET
                user_id = excluded.user_id,
                address = excluded.address,
                updated_at = excluded.updated_at
            "#,
            params![
                self.namespace,
                entry.currency,
                entry.user_id,
                entry.address,
                chrono::Utc::now().timestamp(),
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn clear_sync(&self, currency: &str) -> StorageResult<bool> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "DELETE FROM cached_addresses WHERE namespace = ?1 AND currency = ?2",
                params![self.namespace, currency],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(rows > 0)
    }

    fn clear_all_sync(&self) -> StorageResult<u64> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "DELETE FROM cached_addresses WHERE namespace = ?1",
                params![self.namespace],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(rows as u64)
    }
}

#[async_trait]
impl AddressCache for SqliteAddressCache {
    async fn get(&self, currency: &str) -> StorageResult<Option<CachedAddress>> {
        self.get_sync(currency)
    }

    async fn put(&self, entry: &CachedAddress) -> StorageResult<()> {
        self.put_sync(entry)
    }

    async fn clear(&self, currency: &str) -> StorageResult<bool> {
        self.clear_sync(currency)
    }

    async fn clear_all(&self) -> StorageResult<u64> {
        self.clear_all_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let cache = SqliteAddressCache::in_memory().unwrap();
        let entry = CachedAddress::new(Some("42".to_string()), "TON", "EQ_first");

        cache.put(&entry).await.unwrap();

        let retrieved = cache.get("TON").await.unwrap().unwrap();
        assert_eq!(retrieved, entry);
        assert!(cache.get("USDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_currency() {
        let cache = SqliteAddressCache::in_memory().unwrap();

        cache
            .put(&CachedAddress::new(None, "TON", "EQ_old"))
            .await
            .unwrap();
        cache
            .put(&CachedAddress::new(Some("7".to_string()), "TON", "EQ_new"))
            .await
            .unwrap();

        let retrieved = cache.get("TON").await.unwrap().unwrap();
        assert_eq!(retrieved.address, "EQ_new");
        assert_eq!(retrieved.user_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = SqliteAddressCache::in_memory().unwrap();
        cache
            .put(&CachedAddress::new(None, "TON", "EQ_a"))
            .await
            .unwrap();
        cache
            .put(&CachedAddress::new(None, "USDT", "EQ_b"))
            .await
            .unwrap();

        assert!(cache.clear("TON").await.unwrap());
        assert!(!cache.clear("TON").await.unwrap());
        assert_eq!(cache.clear_all().await.unwrap(), 1);
        assert!(cache.get("USDT").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let cache = SqliteAddressCache::new(&path).unwrap();
            cache
                .put(&CachedAddress::new(Some("42".to_string()), "TON", "EQ_persisted"))
                .await
                .unwrap();
        }

        let reopened = SqliteAddressCache::new(&path).unwrap();
        let entry = reopened.get("TON").await.unwrap().unwrap();
        assert_eq!(entry.address, "EQ_persisted");
    }
}
