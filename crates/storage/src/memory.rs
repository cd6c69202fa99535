//! In-process store.

use crate::CommitmentStore;
use async_trait::async_trait;
use custody_types::{CustodyError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, String>,
    lists: HashMap<String, Vec<String>>,
}

/// Store backed by process memory. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| CustodyError::Storage(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl CommitmentStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.records.contains_key(key) {
            return Ok(false);
        }
        inner.records.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn insert_with_recent(&self, key: &str, value: &str, list_key: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.records.contains_key(key) {
            return Ok(false);
        }
        inner.records.insert(key.to_string(), value.to_string());
        inner
            .lists
            .entry(list_key.to_string())
            .or_default()
            .push(key.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.records.get(key).cloned())
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn push_recent(&self, list_key: &str, value: &str) -> Result<()> {
        self.lock()?
            .lists
            .entry(list_key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn list_recent(&self, list_key: &str, limit: usize) -> Result<Vec<String>> {
        let inner = self.lock()?;
        Ok(inner
            .lists
            .get(list_key)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = MemoryStore::new();
        assert!(store.set_if_absent("share/ab/07/up", "1").await.unwrap());
        assert!(!store.set_if_absent("share/ab/07/up", "2").await.unwrap());
        assert_eq!(
            store.get("share/ab/07/up").await.unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(store.get("share/ab/07/down").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_with_recent_appends_once() {
        let store = MemoryStore::new();
        assert!(store
            .insert_with_recent("commitment/aa/07", "first", "recent/testnet")
            .await
            .unwrap());
        assert!(!store
            .insert_with_recent("commitment/aa/07", "second", "recent/testnet")
            .await
            .unwrap());

        assert_eq!(
            store.get("commitment/aa/07").await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            store.list_recent("recent/testnet", 10).await.unwrap(),
            vec!["commitment/aa/07"]
        );
    }

    #[tokio::test]
    async fn test_prefix_scan_is_bounded() {
        let store = MemoryStore::new();
        store.set_if_absent("commitment/aa/01", "a1").await.unwrap();
        store.set_if_absent("commitment/aa/02", "a2").await.unwrap();
        store.set_if_absent("commitment/ab/01", "b1").await.unwrap();

        let records = store.get_all("commitment/aa/").await.unwrap();
        assert_eq!(
            records,
            vec![
                ("commitment/aa/01".to_string(), "a1".to_string()),
                ("commitment/aa/02".to_string(), "a2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let store = MemoryStore::new();
        for value in ["one", "two", "three"] {
            store.push_recent("recent/testnet", value).await.unwrap();
        }
        assert_eq!(
            store.list_recent("recent/testnet", 2).await.unwrap(),
            vec!["three", "two"]
        );
        assert!(store.list_recent("recent/signet", 10).await.unwrap().is_empty());
    }
}
