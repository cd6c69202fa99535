//! Persistence for commitments and signature shares.
//!
//! Records are flat strings under natural keys (see
//! [`custody_types::commitment_key`] and friends). Every write is
//! set-if-absent: the first writer of a key wins and later writes are
//! ignored, which is what makes commitments and shares immutable.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use custody_types::Result;

/// Key/value store with write-once records and append-only recent lists.
#[async_trait]
pub trait CommitmentStore: Send + Sync {
    /// Insert `value` under `key` unless the key exists. Returns whether the
    /// value was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every record whose key starts with `prefix`, ordered by key.
    async fn get_all(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Set-if-absent of `key`, and on insert append `key` to the list at
    /// `list_key`, as one atomic write. Returns whether the record was written.
    async fn insert_with_recent(&self, key: &str, value: &str, list_key: &str) -> Result<bool>;

    /// Append `value` to the list at `list_key`.
    async fn push_recent(&self, list_key: &str, value: &str) -> Result<()>;

    /// Up to `limit` entries of the list, newest first.
    async fn list_recent(&self, list_key: &str, limit: usize) -> Result<Vec<String>>;
}
