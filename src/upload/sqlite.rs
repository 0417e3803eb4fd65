//! SQLite-backed key/value store.
//!
//! A single `kv_store` table stands in for the platform key/value storage.
//! Calls run on the blocking pool so the async queue never stalls on disk.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use super::store::KeyValueStore;
use crate::error::{Result, ScreeningError};

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteStore] Opened key/value store at {}", db_path);
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> SqlResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| ScreeningError::Persistence {
                message: "SQLite connection lock poisoned".to_string(),
            })?;
            f(&*conn).map_err(ScreeningError::from)
        })
        .await?
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
                 VALUES (?, ?, strftime('%s', 'now'))",
                params![key, value],
            )
            .map(|_| ())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get("@pending_uploads").await.unwrap().is_none());

        store.set("@pending_uploads", "[]").await.unwrap();
        store.set("@pending_uploads", "[1]").await.unwrap();
        assert_eq!(
            store.get("@pending_uploads").await.unwrap().as_deref(),
            Some("[1]")
        );

        store.remove("@pending_uploads").await.unwrap();
        assert!(store.get("@pending_uploads").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::new(path).unwrap();
            store.set("@upload_endpoint", "https://example.test").await.unwrap();
        }

        let store = SqliteStore::new(path).unwrap();
        assert_eq!(
            store.get("@upload_endpoint").await.unwrap().as_deref(),
            Some("https://example.test")
        );
    }
}
