use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::error::StoreError;
use crate::storage::SeenStore;

/// Local seen-set backend, used when `SEEN_STORE_PATH` is configured.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open(db_path)?)),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS seen_listings (
                seen_set_key TEXT NOT NULL,
                url TEXT NOT NULL,
                first_seen DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (seen_set_key, url)
            )",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    #[cfg(test)]
    pub fn count(&self, key: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM seen_listings WHERE seen_set_key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl SeenStore for SqliteStore {
    async fn is_member(&self, key: &str, url: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;

        let found: Option<i32> = conn
            .query_row(
                "SELECT 1 FROM seen_listings WHERE seen_set_key = ?1 AND url = ?2",
                params![key, url],
                |row| row.get(0),
            )
            .optional()?;

        Ok(found.is_some())
    }

    async fn add_all(&self, key: &str, urls: &[String]) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for url in urls {
            tx.execute(
                "INSERT OR IGNORE INTO seen_listings (seen_set_key, url) VALUES (?1, ?2)",
                params![key, url],
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}
