//! Commitment Engine
//!
//! A commitment ties one deposit UTXO to a one-time key. The depositor signs
//! (but does not finalize) a cooperative spend of the deposit into the 2-of-2
//! output `OP_2 <operator> <one_time> OP_2 OP_CHECKMULTISIG` and publishes a
//! nonce signature by the one-time key. Shares signed later against that
//! nonce signature reveal the one-time key if both tags are published, and
//! with it the ability to complete the commitment spend.
//!
//! Records are written once under `(txid, nonce)` and never change.

use crate::fees::{sign_with_fee_correction, SigningStep};
use crate::records::{find_commitment, load_commitment};
use bitcoin::secp256k1::PublicKey;
use bitcoin::{ScriptBuf, Transaction};
use chrono::Utc;
use custody_bitcoin::{
    psbt_from_hex, psbt_to_hex, CustodyInput, ScriptFactory, Signer, SpendPath,
    TransactionBuilder, UnsignedSpend,
};
use custody_crypto::{
    derive_one_time_key, parse_public_key, sign_nonce, verify_nonce_signature, KeyPair,
};
use custody_storage::CommitmentStore;
use custody_types::{
    commitment_prefix, recent_commitments_key, Commitment, CustodyError, FeeRates, Network,
    NonceSignature, Result,
};
use std::slice;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A commitment as submitted by the depositor.
#[derive(Debug, Clone)]
pub struct CommitmentRequest {
    /// Deposit UTXO the commitment spends.
    pub txid: String,
    pub nonce: u8,
    /// Depositor-signed commitment PSBT (hex).
    pub psbt: String,
    pub one_time_pubkey: PublicKey,
    pub nonce_signature: NonceSignature,
    pub network: Network,
}

pub struct CommitmentEngine {
    store: Arc<dyn CommitmentStore>,
    factory: ScriptFactory,
}

impl CommitmentEngine {
    pub fn new(store: Arc<dyn CommitmentStore>) -> Result<Self> {
        Ok(Self {
            store,
            factory: ScriptFactory::new()?,
        })
    }

    pub fn store(&self) -> &Arc<dyn CommitmentStore> {
        &self.store
    }

    pub fn derive_one_time_key(
        &self,
        depositor_secret: &[u8],
        txid: &str,
        nonce: u8,
    ) -> Result<KeyPair> {
        derive_one_time_key(depositor_secret, txid, nonce)
    }

    /// Unsigned cooperative spend of `input` into the commitment output.
    pub fn build_commitment(
        &self,
        input: &CustodyInput,
        operator: &PublicKey,
        one_time: &PublicKey,
        network: Network,
        fee_rates: FeeRates,
    ) -> Result<UnsignedSpend> {
        let output = self.factory.commitment_output(operator, one_time, network);
        TransactionBuilder::new(fee_rates).build_spend(
            slice::from_ref(input),
            &output.address,
            SpendPath::Cooperative,
        )
    }

    /// Validate and persist a commitment. Registering the same `(txid, nonce)`
    /// again returns the record already stored.
    pub async fn register_commitment(
        &self,
        request: CommitmentRequest,
        operator: &PublicKey,
    ) -> Result<Commitment> {
        let txid = request.txid.to_lowercase();
        let psbt = psbt_from_hex(&request.psbt)?;
        let expected = self
            .factory
            .commitment_output(operator, &request.one_time_pubkey, request.network)
            .script_pubkey;
        let vout = check_commitment_tx(&psbt.unsigned_tx, &txid, request.nonce, &expected)?;
        verify_nonce_signature(
            &request.one_time_pubkey,
            request.nonce,
            &request.nonce_signature,
        )?;

        let commitment = Commitment {
            txid: txid.clone(),
            vout,
            nonce: request.nonce,
            one_time_pubkey: request.one_time_pubkey.to_string(),
            psbt: psbt_to_hex(&psbt),
            network: request.network,
            nonce_signature: request.nonce_signature,
            created_at: Utc::now(),
        };

        let key = commitment.store_key();
        let json = serde_json::to_string(&commitment)?;
        let recent = recent_commitments_key(commitment.network);
        if !self.store.insert_with_recent(&key, &json, &recent).await? {
            let existing = load_commitment(self.store.as_ref(), &txid, request.nonce).await?;
            if existing.psbt != commitment.psbt
                || existing.one_time_pubkey != commitment.one_time_pubkey
            {
                warn!(
                    "Commitment {}:{} already registered with different content, keeping the first",
                    txid, request.nonce
                );
            } else {
                debug!("Commitment {}:{} already registered", txid, request.nonce);
            }
            return Ok(existing);
        }

        info!(
            txid = %commitment.txid,
            nonce = commitment.nonce,
            network = %commitment.network,
            "Registered commitment"
        );
        Ok(commitment)
    }

    /// Most recently registered commitments on `network`, newest first.
    pub async fn list_commitments(
        &self,
        network: Network,
        limit: usize,
    ) -> Result<Vec<Commitment>> {
        let keys = self
            .store
            .list_recent(&recent_commitments_key(network), limit)
            .await?;

        let mut commitments = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await? {
                Some(json) => commitments.push(serde_json::from_str(&json)?),
                None => warn!("Recent list references missing commitment {}", key),
            }
        }
        Ok(commitments)
    }

    /// Every commitment registered for a deposit UTXO, by nonce.
    pub async fn commitments_for(&self, txid: &str) -> Result<Vec<Commitment>> {
        let mut commitments = self
            .store
            .get_all(&commitment_prefix(txid))
            .await?
            .into_iter()
            .map(|(_, json)| serde_json::from_str::<Commitment>(&json))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        commitments.sort_by_key(|commitment| commitment.nonce);
        Ok(commitments)
    }

    pub async fn get_commitment(&self, txid: &str, nonce: u8) -> Result<Commitment> {
        load_commitment(self.store.as_ref(), txid, nonce).await
    }

    pub async fn find_commitment(&self, txid: &str, nonce: u8) -> Result<Option<Commitment>> {
        find_commitment(self.store.as_ref(), txid, nonce).await
    }

    /// Depositor side: derive the one-time key, sign the commitment spend
    /// (without finalizing), correct its fee against the co-signed size,
    /// sign the nonce and register.
    pub async fn create_commitment(
        &self,
        signer: &dyn Signer,
        depositor_secret: &[u8],
        input: &CustodyInput,
        operator: &PublicKey,
        nonce: u8,
        fee_rates: FeeRates,
    ) -> Result<Commitment> {
        let network = signer.network().await?;
        let txid = input.utxo.txid.to_lowercase();
        let one_time = self.derive_one_time_key(depositor_secret, &txid, nonce)?;
        let destination = self
            .factory
            .commitment_output(operator, &one_time.public_key(), network)
            .address;

        let builder = TransactionBuilder::new(fee_rates);
        let estimate = self.build_commitment(
            input,
            operator,
            &one_time.public_key(),
            network,
            fee_rates,
        )?;
        let signed = sign_with_fee_correction(
            &builder,
            &[SigningStep {
                signer,
                auto_finalize: false,
            }],
            estimate.fee_sats,
            |fee| {
                builder
                    .build_spend_with_fee(
                        slice::from_ref(input),
                        &destination,
                        SpendPath::Cooperative,
                        fee,
                    )
                    .map(|spend| spend.psbt)
            },
        )
        .await?;
        debug!(
            "Commitment spend of {} signed: fee {} sats, ~{} vB once co-signed",
            input.utxo.outpoint(),
            signed.fee,
            signed.vsize
        );

        self.register_commitment(
            CommitmentRequest {
                txid,
                nonce,
                psbt: psbt_to_hex(&signed.psbt),
                one_time_pubkey: one_time.public_key(),
                nonce_signature: sign_nonce(&one_time, nonce),
                network,
            },
            operator,
        )
        .await
    }

    /// Whether `depositor_secret` re-derives the commitment's one-time key and
    /// the commitment output pays to it.
    pub fn key_matches(
        &self,
        depositor_secret: &[u8],
        commitment: &Commitment,
        operator: &PublicKey,
    ) -> Result<bool> {
        let derived =
            self.derive_one_time_key(depositor_secret, &commitment.txid, commitment.nonce)?;
        if parse_public_key(&commitment.one_time_pubkey)? != derived.public_key() {
            return Ok(false);
        }
        let psbt = psbt_from_hex(&commitment.psbt)?;
        let expected = self
            .factory
            .commitment_output(operator, &derived.public_key(), commitment.network)
            .script_pubkey;
        Ok(psbt
            .unsigned_tx
            .output
            .first()
            .is_some_and(|output| output.script_pubkey == expected))
    }
}

/// The sole output must pay `expected` and some input must spend `txid`.
/// Returns the vout spent.
fn check_commitment_tx(
    tx: &Transaction,
    txid: &str,
    nonce: u8,
    expected: &ScriptBuf,
) -> Result<u32> {
    let mismatch = |expected: String, actual: String| CustodyError::CommitmentMismatch {
        txid: txid.to_string(),
        nonce,
        expected,
        actual,
    };

    match tx.output.as_slice() {
        [output] if output.script_pubkey == *expected => {}
        [output] => {
            return Err(mismatch(
                expected.to_hex_string(),
                output.script_pubkey.to_hex_string(),
            ))
        }
        outputs => {
            return Err(mismatch(
                "1 output".to_string(),
                format!("{} outputs", outputs.len()),
            ))
        }
    }

    tx.input
        .iter()
        .find(|input| input.previous_output.txid.to_string() == txid)
        .map(|input| input.previous_output.vout)
        .ok_or_else(|| {
            let spent = tx
                .input
                .iter()
                .map(|input| input.previous_output.to_string())
                .collect::<Vec<_>>()
                .join(",");
            mismatch(format!("spend of {}", txid), spent)
        })
}
