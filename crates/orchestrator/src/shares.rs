//! Signature share acceptance.

use crate::records::{load_commitment, load_shares};
use custody_crypto::{
    compute_share, derive_one_time_key, parse_public_key, scalar_from_hex, scalar_to_hex,
    verify_share,
};
use custody_storage::CommitmentStore;
use custody_types::{share_key, Commitment, CustodyError, Result, ShareTag, SignatureShare};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shares published for one commitment, keyed by tag. May be partial.
pub type ShareSet = BTreeMap<ShareTag, SignatureShare>;

pub struct SignatureShareEngine {
    store: Arc<dyn CommitmentStore>,
}

impl SignatureShareEngine {
    pub fn new(store: Arc<dyn CommitmentStore>) -> Self {
        Self { store }
    }

    /// Verify and persist a share. Returns `false` when the identical share
    /// was already recorded.
    pub async fn submit_share(
        &self,
        txid: &str,
        nonce: u8,
        tag: ShareTag,
        value: &str,
        message: &str,
    ) -> Result<bool> {
        let txid = txid.to_lowercase();
        let commitment = load_commitment(self.store.as_ref(), &txid, nonce).await?;
        let failed = |reason: String| CustodyError::ShareVerificationFailed {
            txid: txid.clone(),
            nonce,
            tag: tag.to_string(),
            reason,
        };

        if message != tag.message() {
            return Err(failed(format!(
                "message {:?} does not match tag {}",
                message, tag
            )));
        }
        let scalar = scalar_from_hex(value).map_err(|e| failed(e.to_string()))?;
        let one_time = parse_public_key(&commitment.one_time_pubkey)?;
        if !verify_share(&one_time, &commitment.nonce_signature, tag, &scalar)? {
            return Err(failed("share does not verify against the nonce signature".to_string()));
        }

        let share = SignatureShare {
            txid: txid.clone(),
            nonce,
            tag,
            value: scalar_to_hex(&scalar),
        };
        let key = share_key(&txid, nonce, tag);
        if self
            .store
            .set_if_absent(&key, &serde_json::to_string(&share)?)
            .await?
        {
            info!(txid = %txid, nonce, tag = %tag, "Accepted signature share");
            return Ok(true);
        }

        let existing = load_shares(self.store.as_ref(), &txid, nonce).await?;
        match existing.get(&tag) {
            Some(stored) if stored.value == share.value => {
                debug!("Share {}:{} ({}) already recorded", txid, nonce, tag);
                Ok(false)
            }
            _ => Err(CustodyError::ShareConflict {
                txid,
                nonce,
                tag: tag.to_string(),
            }),
        }
    }

    pub async fn get_shares(&self, txid: &str, nonce: u8) -> Result<ShareSet> {
        load_shares(self.store.as_ref(), &txid.to_lowercase(), nonce).await
    }

    /// Both tags are published.
    pub async fn is_slashable(&self, txid: &str, nonce: u8) -> Result<bool> {
        let shares = self.get_shares(txid, nonce).await?;
        Ok(ShareTag::BOTH.iter().all(|tag| shares.contains_key(tag)))
    }

    /// Publishing `tag` would complete the pair.
    pub async fn would_expose_key(&self, txid: &str, nonce: u8, tag: ShareTag) -> Result<bool> {
        let shares = self.get_shares(txid, nonce).await?;
        Ok(shares.contains_key(&tag.other()) && !shares.contains_key(&tag))
    }

    /// Depositor side: compute the share for `tag` from the depositor secret
    /// and submit it.
    pub async fn create_share(
        &self,
        depositor_secret: &[u8],
        txid: &str,
        nonce: u8,
        tag: ShareTag,
    ) -> Result<SignatureShare> {
        let commitment = load_commitment(self.store.as_ref(), txid, nonce).await?;
        let share = produce_share(depositor_secret, &commitment, tag)?;
        if self.would_expose_key(txid, nonce, tag).await? {
            warn!(
                "Publishing {} for {}:{} exposes the one-time key",
                tag, commitment.txid, nonce
            );
        }
        self.submit_share(&share.txid, nonce, tag, &share.value, tag.message())
            .await?;
        Ok(share)
    }
}

/// Compute a share for a registered commitment without submitting it.
pub fn produce_share(
    depositor_secret: &[u8],
    commitment: &Commitment,
    tag: ShareTag,
) -> Result<SignatureShare> {
    let one_time = derive_one_time_key(depositor_secret, &commitment.txid, commitment.nonce)?;
    if one_time.public_key() != parse_public_key(&commitment.one_time_pubkey)? {
        return Err(CustodyError::InvalidKey(format!(
            "Secret does not derive the one-time key of {}:{}",
            commitment.txid, commitment.nonce
        )));
    }
    let value = compute_share(&one_time, commitment.nonce, &commitment.nonce_signature, tag)?;
    Ok(SignatureShare {
        txid: commitment.txid.clone(),
        nonce: commitment.nonce,
        tag,
        value: scalar_to_hex(&value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use custody_crypto::{sign_nonce, FieldScalar};
    use custody_storage::MemoryStore;
    use custody_types::Network;

    const TXID: &str = "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098";
    const SECRET: &[u8] = b"share engine secret";

    async fn seeded(nonce: u8) -> (SignatureShareEngine, Commitment) {
        let store: Arc<dyn CommitmentStore> = Arc::new(MemoryStore::new());
        let one_time = derive_one_time_key(SECRET, TXID, nonce).unwrap();
        let commitment = Commitment {
            txid: TXID.to_string(),
            vout: 0,
            nonce,
            one_time_pubkey: one_time.public_key().to_string(),
            psbt: String::new(),
            network: Network::Testnet,
            nonce_signature: sign_nonce(&one_time, nonce),
            created_at: Utc::now(),
        };
        store
            .set_if_absent(
                &commitment.store_key(),
                &serde_json::to_string(&commitment).unwrap(),
            )
            .await
            .unwrap();
        (SignatureShareEngine::new(store), commitment)
    }

    #[tokio::test]
    async fn test_unknown_commitment() {
        let (engine, _) = seeded(1).await;
        let err = engine
            .submit_share(TXID, 2, ShareTag::Up, "01", "up")
            .await
            .unwrap_err();
        assert!(matches!(err, CustodyError::CommitmentNotFound { nonce: 2, .. }));
    }

    #[tokio::test]
    async fn test_rejects_wrong_message_and_value() {
        let (engine, commitment) = seeded(1).await;
        let share = produce_share(SECRET, &commitment, ShareTag::Up).unwrap();

        let wrong_message = engine
            .submit_share(TXID, 1, ShareTag::Up, &share.value, "down")
            .await
            .unwrap_err();
        assert!(matches!(wrong_message, CustodyError::ShareVerificationFailed { .. }));

        let wrong_value = engine
            .submit_share(TXID, 1, ShareTag::Up, &scalar_to_hex(&FieldScalar::one()), "up")
            .await
            .unwrap_err();
        assert!(matches!(wrong_value, CustodyError::ShareVerificationFailed { .. }));
        assert!(engine.get_shares(TXID, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_resubmission_is_noop() {
        let (engine, commitment) = seeded(1).await;
        let share = produce_share(SECRET, &commitment, ShareTag::Down).unwrap();
        assert!(engine
            .submit_share(TXID, 1, ShareTag::Down, &share.value, "down")
            .await
            .unwrap());
        assert!(!engine
            .submit_share(TXID, 1, ShareTag::Down, &share.value, "down")
            .await
            .unwrap());
        assert_eq!(engine.get_shares(TXID, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_share_is_rejected() {
        // A valid share under a different nonce signature cannot land on the
        // same key, so plant a conflicting record directly.
        let (engine, commitment) = seeded(1).await;
        let planted = SignatureShare {
            txid: TXID.to_string(),
            nonce: 1,
            tag: ShareTag::Up,
            value: scalar_to_hex(&FieldScalar::one()),
        };
        engine
            .store
            .set_if_absent(
                &share_key(TXID, 1, ShareTag::Up),
                &serde_json::to_string(&planted).unwrap(),
            )
            .await
            .unwrap();

        let share = produce_share(SECRET, &commitment, ShareTag::Up).unwrap();
        let err = engine
            .submit_share(TXID, 1, ShareTag::Up, &share.value, "up")
            .await
            .unwrap_err();
        assert!(matches!(err, CustodyError::ShareConflict { .. }));
    }

    #[tokio::test]
    async fn test_exposure_tracking() {
        let (engine, _) = seeded(1).await;
        assert!(!engine.would_expose_key(TXID, 1, ShareTag::Up).await.unwrap());

        engine
            .create_share(SECRET, TXID, 1, ShareTag::Up)
            .await
            .unwrap();
        assert!(!engine.is_slashable(TXID, 1).await.unwrap());
        assert!(engine.would_expose_key(TXID, 1, ShareTag::Down).await.unwrap());
        assert!(!engine.would_expose_key(TXID, 1, ShareTag::Up).await.unwrap());

        engine
            .create_share(SECRET, TXID, 1, ShareTag::Down)
            .await
            .unwrap();
        assert!(engine.is_slashable(TXID, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_secret_cannot_produce() {
        let (_, commitment) = seeded(1).await;
        assert!(matches!(
            produce_share(b"not the depositor", &commitment, ShareTag::Up),
            Err(CustodyError::InvalidKey(_))
        ));
    }
}
