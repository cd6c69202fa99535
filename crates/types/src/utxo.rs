//! Deposit outputs and balances.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default relative time-locks (in blocks) offered to depositors.
pub const DEFAULT_LOCK_SET: [u32; 3] = [1, 10, 100];

/// A UTXO sitting on one of the depositor's custody addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64, // satoshis
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    /// Relative lock of the custody script this output pays to.
    pub lock_blocks: u32,
    /// Derived from the chain tip at scan time; see [`is_locked`].
    pub locked: bool,
}

impl DepositUtxo {
    /// Build a UTXO record and derive its lock status against `tip_height`.
    pub fn new(
        txid: impl Into<String>,
        vout: u32,
        value: u64,
        block_height: Option<u64>,
        lock_blocks: u32,
        tip_height: u64,
    ) -> Self {
        let confirmed = block_height.is_some();
        Self {
            txid: txid.into(),
            vout,
            value,
            confirmed,
            block_height,
            lock_blocks,
            locked: is_locked(confirmed, block_height, lock_blocks, tip_height),
        }
    }

    /// Recompute `locked` for a new chain tip.
    pub fn refresh_lock(&mut self, tip_height: u64) {
        self.locked = is_locked(self.confirmed, self.block_height, self.lock_blocks, tip_height);
    }

    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.txid, self.vout)
    }
}

/// A deposit is spendable by its owner alone once the CSV branch is satisfiable
/// in the next block: confirmed and `tip - height >= lock_blocks - 1`.
pub fn is_locked(
    confirmed: bool,
    block_height: Option<u64>,
    lock_blocks: u32,
    tip_height: u64,
) -> bool {
    match (confirmed, block_height) {
        (true, Some(height)) => match tip_height.checked_sub(height) {
            Some(depth) => depth < u64::from(lock_blocks).saturating_sub(1),
            None => true,
        },
        _ => true,
    }
}

/// Display order used by wallets: unconfirmed first, then newest blocks,
/// then longer locks, then larger values.
pub fn sort_deposits(utxos: &mut [DepositUtxo]) {
    utxos.sort_by(|a, b| {
        let by_lock = b.lock_blocks.cmp(&a.lock_blocks);
        match (a.confirmed, b.confirmed) {
            (true, true) => b.block_height.cmp(&a.block_height).then(by_lock),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => by_lock.then(b.value.cmp(&a.value)),
        }
    });
}

/// Aggregated balance across all custody addresses of a depositor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: u64,
    pub unconfirmed: i64,
    pub total: u64,
}

impl Balance {
    pub fn add(&mut self, confirmed: u64, unconfirmed: i64) {
        self.confirmed += confirmed;
        self.unconfirmed += unconfirmed;
        self.total = (self.confirmed as i64 + self.unconfirmed).max(0) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(txid: &str, height: Option<u64>, lock: u32, value: u64) -> DepositUtxo {
        DepositUtxo::new(txid, 0, value, height, lock, 1_000)
    }

    #[test]
    fn test_unconfirmed_is_locked() {
        assert!(is_locked(false, None, 1, 500));
        assert!(is_locked(false, Some(10), 1, 500));
    }

    #[test]
    fn test_lock_boundary() {
        // Confirmed in block 100 with a 10 block lock: 10 confirmations unlock it.
        assert!(is_locked(true, Some(100), 10, 100));
        assert!(is_locked(true, Some(100), 10, 108));
        assert!(!is_locked(true, Some(100), 10, 109));
        // One block lock is spendable as soon as it confirms.
        assert!(!is_locked(true, Some(100), 1, 100));
    }

    #[test]
    fn test_tip_behind_block_is_locked() {
        assert!(is_locked(true, Some(200), 1, 150));
    }

    #[test]
    fn test_refresh_lock() {
        let mut u = DepositUtxo::new("aa", 0, 100_000, Some(100), 10, 100);
        assert!(u.locked);
        u.refresh_lock(109);
        assert!(!u.locked);
    }

    #[test]
    fn test_sort_order() {
        let mut utxos = vec![
            utxo("old", Some(10), 1, 5),
            utxo("pending-small", None, 10, 1),
            utxo("new", Some(20), 1, 5),
            utxo("pending-long", None, 100, 1),
            utxo("new-long", Some(20), 100, 5),
        ];
        sort_deposits(&mut utxos);
        let order: Vec<_> = utxos.iter().map(|u| u.txid.as_str()).collect();
        assert_eq!(
            order,
            vec!["pending-long", "pending-small", "new-long", "new", "old"]
        );
    }

    #[test]
    fn test_balance_aggregation() {
        let mut balance = Balance::default();
        balance.add(70_000, 5_000);
        balance.add(1_000, -2_000);
        assert_eq!(balance.confirmed, 71_000);
        assert_eq!(balance.unconfirmed, 3_000);
        assert_eq!(balance.total, 74_000);
    }
}
