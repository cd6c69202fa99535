//! Recovery Engine
//!
//! Once both shares for a commitment are published, the one-time key follows
//! from `a = (m_up − m_down)·(σ_down − σ_up)⁻¹`. With it the operator can
//! complete the commitment spend and then sweep the 2-of-2 commitment output
//! to a penalty address.

use crate::fees::{sign_with_fee_correction, SigningStep};
use crate::records::{load_commitment, load_shares};
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::Address;
use custody_bitcoin::{
    extract_transaction, psbt_fee, psbt_from_hex, LocalSigner, ScriptFactory, Signer,
    SigningSpec, TransactionBuilder,
};
use custody_crypto::{parse_public_key, recover_key, scalar_from_hex, KeyPair};
use custody_storage::CommitmentStore;
use custody_types::{CustodyError, FeeRates, Result, ShareTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Raw transactions produced by a slash, ready to broadcast in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashTransactions {
    pub commitment_txid: String,
    /// Finalized commitment transaction (hex).
    pub commitment_tx: String,
    pub slash_txid: String,
    /// Slash transaction sweeping the commitment output (hex).
    pub slash_tx: String,
    pub fee: u64,
}

pub struct RecoveryEngine {
    store: Arc<dyn CommitmentStore>,
    factory: ScriptFactory,
}

impl RecoveryEngine {
    pub fn new(store: Arc<dyn CommitmentStore>) -> Result<Self> {
        Ok(Self {
            store,
            factory: ScriptFactory::new()?,
        })
    }

    /// Recover the one-time key from the published shares. The store is
    /// re-read on every call.
    pub async fn recover_one_time_key(&self, txid: &str, nonce: u8) -> Result<KeyPair> {
        let txid = txid.to_lowercase();
        let commitment = load_commitment(self.store.as_ref(), &txid, nonce).await?;
        let shares = load_shares(self.store.as_ref(), &txid, nonce).await?;

        let (Some(up), Some(down)) = (shares.get(&ShareTag::Up), shares.get(&ShareTag::Down))
        else {
            return Err(CustodyError::InsufficientShares {
                txid,
                nonce,
                present: shares
                    .keys()
                    .map(|tag| tag.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            });
        };

        let expected = parse_public_key(&commitment.one_time_pubkey)?;
        let key = recover_key(
            &scalar_from_hex(&up.value)?,
            &scalar_from_hex(&down.value)?,
            &expected,
        )
        .ok_or_else(|| CustodyError::RecoveryInconsistent {
            txid: txid.clone(),
            nonce,
        })?;

        info!(txid = %txid, nonce, "Recovered one-time key {}", key.public_key());
        Ok(key)
    }

    /// Co-sign and finalize the commitment with `operator`, then build the
    /// slash spending its output to `penalty` with the operator key and the
    /// recovered key. Nothing is broadcast.
    pub async fn slash(
        &self,
        txid: &str,
        nonce: u8,
        penalty: &Address,
        operator: &dyn Signer,
        fee_rates: FeeRates,
    ) -> Result<SlashTransactions> {
        let commitment = load_commitment(self.store.as_ref(), txid, nonce).await?;
        let key = self.recover_one_time_key(txid, nonce).await?;
        let network = commitment.network;

        let psbt = psbt_from_hex(&commitment.psbt)?;
        let spec = SigningSpec::all(&psbt, true);
        let cosigned = operator.sign_transaction(psbt, &spec).await?;
        let commitment_tx = extract_transaction(&cosigned)?;
        debug!(
            "Commitment {}:{} finalized as {}",
            commitment.txid,
            nonce,
            commitment_tx.compute_txid()
        );

        let output = self.factory.commitment_output(
            &operator.public_key().await?,
            &key.public_key(),
            network,
        );
        let builder = TransactionBuilder::new(fee_rates);
        let initial_fee = psbt_fee(&builder.build_slash(&commitment_tx, &output, penalty, None)?)?;

        let recovered = LocalSigner::new(key, network);
        let signed = sign_with_fee_correction(
            &builder,
            &[
                SigningStep {
                    signer: operator,
                    auto_finalize: false,
                },
                SigningStep {
                    signer: &recovered,
                    auto_finalize: true,
                },
            ],
            initial_fee,
            |fee| builder.build_slash(&commitment_tx, &output, penalty, Some(fee)),
        )
        .await?;
        let slash_tx = extract_transaction(&signed.psbt)?;

        info!(
            txid = %commitment.txid,
            nonce,
            fee = signed.fee,
            vsize = signed.vsize,
            "Built slash to {}",
            penalty
        );
        Ok(SlashTransactions {
            commitment_txid: commitment_tx.compute_txid().to_string(),
            commitment_tx: serialize_hex(&commitment_tx),
            slash_txid: slash_tx.compute_txid().to_string(),
            slash_tx: serialize_hex(&slash_tx),
            fee: signed.fee,
        })
    }
}
