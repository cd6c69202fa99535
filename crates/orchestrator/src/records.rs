//! Typed reads of store records.

use custody_storage::CommitmentStore;
use custody_types::{
    commitment_key, share_prefix, Commitment, CustodyError, Result, ShareTag, SignatureShare,
};
use std::collections::BTreeMap;

pub(crate) async fn find_commitment(
    store: &dyn CommitmentStore,
    txid: &str,
    nonce: u8,
) -> Result<Option<Commitment>> {
    match store.get(&commitment_key(txid, nonce)).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub(crate) async fn load_commitment(
    store: &dyn CommitmentStore,
    txid: &str,
    nonce: u8,
) -> Result<Commitment> {
    find_commitment(store, txid, nonce)
        .await?
        .ok_or_else(|| CustodyError::CommitmentNotFound {
            txid: txid.to_string(),
            nonce,
        })
}

/// Shares published for `(txid, nonce)`, keyed by tag.
pub(crate) async fn load_shares(
    store: &dyn CommitmentStore,
    txid: &str,
    nonce: u8,
) -> Result<BTreeMap<ShareTag, SignatureShare>> {
    let mut shares = BTreeMap::new();
    for (_, json) in store.get_all(&share_prefix(txid, nonce)).await? {
        let share: SignatureShare = serde_json::from_str(&json)?;
        shares.insert(share.tag, share);
    }
    Ok(shares)
}
