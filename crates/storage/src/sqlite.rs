//! SQLite-backed store.
//!
//! Two tables:
//! - `records`: write-once key/value pairs
//! - `recent`: append-only lists, ordered by insertion

use crate::CommitmentStore;
use async_trait::async_trait;
use custody_types::{CustodyError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Durable store for commitments and shares.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CustodyError::Storage(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CustodyError::Storage(format!("Failed to open in-memory database: {}", e))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CustodyError::Storage(format!("Lock error: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS recent (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                list_key TEXT NOT NULL,
                value TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS recent_by_list ON recent (list_key, id);",
        )
        .map_err(|e| CustodyError::Storage(format!("Failed to create schema: {}", e)))?;

        debug!("Commitment store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl CommitmentStore for SqliteStore {
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO records (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| CustodyError::Storage(format!("Failed to write {}: {}", key, e)))?;
        Ok(inserted == 1)
    }

    async fn insert_with_recent(&self, key: &str, value: &str, list_key: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CustodyError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO records (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| CustodyError::Storage(format!("Failed to write {}: {}", key, e)))?;
        if inserted == 1 {
            tx.execute(
                "INSERT INTO recent (list_key, value) VALUES (?1, ?2)",
                params![list_key, key],
            )
            .map_err(|e| {
                CustodyError::Storage(format!("Failed to append to {}: {}", list_key, e))
            })?;
        }

        tx.commit()
            .map_err(|e| CustodyError::Storage(format!("Failed to commit {}: {}", key, e)))?;
        Ok(inserted == 1)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM records WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CustodyError::Storage(format!("Query error: {}", e)))
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT key, value FROM records
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )
            .map_err(|e| CustodyError::Storage(format!("Query error: {}", e)))?;

        let records = stmt
            .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| CustodyError::Storage(format!("Query error: {}", e)))?
            .collect::<std::result::Result<Vec<(String, String)>, _>>()
            .map_err(|e| CustodyError::Storage(format!("Row error: {}", e)))?;

        Ok(records)
    }

    async fn push_recent(&self, list_key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO recent (list_key, value) VALUES (?1, ?2)",
            params![list_key, value],
        )
        .map_err(|e| CustodyError::Storage(format!("Failed to append to {}: {}", list_key, e)))?;
        Ok(())
    }

    async fn list_recent(&self, list_key: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn
            .prepare("SELECT value FROM recent WHERE list_key = ?1 ORDER BY id DESC LIMIT ?2")
            .map_err(|e| CustodyError::Storage(format!("Query error: {}", e)))?;

        let values = stmt
            .query_map(params![list_key, limit], |row| row.get(0))
            .map_err(|e| CustodyError::Storage(format!("Query error: {}", e)))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| CustodyError::Storage(format!("Row error: {}", e)))?;

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_or_ignore() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.set_if_absent("commitment/aa/07", "first").await.unwrap());
        assert!(!store.set_if_absent("commitment/aa/07", "second").await.unwrap());
        assert_eq!(
            store.get("commitment/aa/07").await.unwrap().as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn test_insert_with_recent_appends_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store
            .insert_with_recent("commitment/aa/07", "first", "recent/testnet")
            .await
            .unwrap());
        assert!(!store
            .insert_with_recent("commitment/aa/07", "second", "recent/testnet")
            .await
            .unwrap());
        assert_eq!(
            store.list_recent("recent/testnet", 10).await.unwrap(),
            vec!["commitment/aa/07"]
        );
    }

    #[tokio::test]
    async fn test_insert_with_recent_rolls_back_on_append_failure() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE recent")
            .unwrap();

        let result = store
            .insert_with_recent("commitment/aa/07", "first", "recent/testnet")
            .await;
        assert!(matches!(result, Err(CustodyError::Storage(_))));
        assert_eq!(store.get("commitment/aa/07").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_does_not_treat_underscore_as_wildcard() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_if_absent("share/a_/07/up", "1").await.unwrap();
        store.set_if_absent("share/ab/07/up", "2").await.unwrap();

        let records = store.get_all("share/a_/").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, "1");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custody.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_if_absent("commitment/cc/01", "c").await.unwrap();
            store.push_recent("recent/signet", "first").await.unwrap();
            store.push_recent("recent/signet", "second").await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("commitment/cc/01").await.unwrap().as_deref(),
            Some("c")
        );
        assert_eq!(
            store.list_recent("recent/signet", 10).await.unwrap(),
            vec!["second", "first"]
        );
        assert_eq!(store.list_recent("recent/signet", 1).await.unwrap(), vec!["second"]);
    }
}
