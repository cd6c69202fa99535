//! Bitcoin transaction building utilities.
//!
//! Supports:
//! - Custody spends through either branch of the TLSC leaf, swept into a
//!   single destination output
//! - Commitment-output spends (the slash transaction)
//! - Fee estimation and post-signing fee correction

use crate::psbt::{projected_vsize, psbt_fee};
use crate::script::CommitmentOutput;
use crate::types::{CustodyInput, FeeCheck, SpendPath, TxInput, TxOutput, UnsignedSpend};
use bitcoin::psbt::Psbt;
use bitcoin::taproot::LeafVersion;
use bitcoin::transaction::Version;
use bitcoin::{
    absolute, Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use custody_types::{CustodyError, FeeRates, Result};
use std::str::FromStr;
use tracing::{debug, info};

/// Dust limit in satoshis.
pub const DUST_LIMIT: u64 = 546;

// Size estimation, in virtual bytes / weight units.
// Non-witness: version + locktime + in/out counts, plus the segwit marker.
const BASE_VSIZE: u64 = 11;
// Outpoint + empty scriptSig + sequence.
const INPUT_BASE_VSIZE: u64 = 41;
// Witness item count byte.
const WITNESS_COUNT_WU: u64 = 1;
const SCHNORR_ITEM_WU: u64 = 1 + 64;
const ECDSA_ITEM_WU: u64 = 1 + 72;
const CONTROL_BLOCK_ITEM_WU: u64 = 1 + 33;

fn parse_txid(txid: &str) -> Result<Txid> {
    Txid::from_str(txid)
        .map_err(|e| CustodyError::InvalidTransaction(format!("Invalid TXID {}: {}", txid, e)))
}

fn output_vsize(script_pubkey: &ScriptBuf) -> u64 {
    // value + script length + script
    8 + 1 + script_pubkey.len() as u64
}

fn push_wu(len: usize) -> u64 {
    let prefix = if len < 0xfd { 1 } else { 3 };
    prefix + len as u64
}

/// Estimated vsize of one custody input on the given branch.
pub fn estimate_custody_input_vsize(input: &CustodyInput, path: SpendPath) -> u64 {
    let witness_wu = WITNESS_COUNT_WU
        + SCHNORR_ITEM_WU * path.signature_count() as u64
        + push_wu(input.output.script.len())
        + CONTROL_BLOCK_ITEM_WU;
    INPUT_BASE_VSIZE + witness_wu.div_ceil(4)
}

/// Estimated vsize of a 2-of-2 P2WSH input.
pub fn estimate_multisig_input_vsize(witness_script: &ScriptBuf) -> u64 {
    let witness_wu = WITNESS_COUNT_WU + 1 + 2 * ECDSA_ITEM_WU + push_wu(witness_script.len());
    INPUT_BASE_VSIZE + witness_wu.div_ceil(4)
}

/// Builder for custody, commitment and slash transactions.
pub struct TransactionBuilder {
    fee_rates: FeeRates,
}

impl TransactionBuilder {
    pub fn new(fee_rates: FeeRates) -> Self {
        Self { fee_rates }
    }

    pub fn fee_rates(&self) -> FeeRates {
        self.fee_rates
    }

    /// Pre-signing size estimate for a custody spend.
    pub fn estimate_spend_vsize(
        &self,
        inputs: &[CustodyInput],
        destination: &Address,
        path: SpendPath,
    ) -> u64 {
        BASE_VSIZE
            + inputs
                .iter()
                .map(|input| estimate_custody_input_vsize(input, path))
                .sum::<u64>()
            + output_vsize(&destination.script_pubkey())
    }

    /// Build a custody spend paying `Σ inputs − fee` to `destination`, with
    /// `fee = max(300, minimum, estimated_vsize × fastest)`.
    pub fn build_spend(
        &self,
        inputs: &[CustodyInput],
        destination: &Address,
        path: SpendPath,
    ) -> Result<UnsignedSpend> {
        let estimated_vsize = self.estimate_spend_vsize(inputs, destination, path);
        let fee = self.fee_rates.fee_for(estimated_vsize);
        self.build_spend_with_fee(inputs, destination, path, fee)
    }

    /// Same as [`build_spend`](Self::build_spend) with an explicit fee, used
    /// for the correction round.
    pub fn build_spend_with_fee(
        &self,
        inputs: &[CustodyInput],
        destination: &Address,
        path: SpendPath,
        fee: u64,
    ) -> Result<UnsignedSpend> {
        if inputs.is_empty() {
            return Err(CustodyError::NoSpendableInputs);
        }

        let total_input: u64 = inputs.iter().map(|input| input.utxo.value).sum();
        let required = fee + DUST_LIMIT;
        if total_input < required {
            return Err(CustodyError::InsufficientFunds {
                available: total_input,
                required,
            });
        }
        let send_amount = total_input - fee;

        let mut tx_inputs = Vec::with_capacity(inputs.len());
        let mut input_records = Vec::with_capacity(inputs.len());
        for input in inputs {
            let sequence = match path {
                SpendPath::Cooperative => Sequence::ENABLE_RBF_NO_LOCKTIME,
                SpendPath::Unilateral => {
                    let blocks = u16::try_from(input.output.lock_blocks).map_err(|_| {
                        CustodyError::InvalidLock {
                            lock_blocks: i64::from(input.output.lock_blocks),
                        }
                    })?;
                    Sequence::from_height(blocks)
                }
            };
            tx_inputs.push(TxIn {
                previous_output: OutPoint::new(parse_txid(&input.utxo.txid)?, input.utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::new(),
            });
            input_records.push(TxInput {
                txid: input.utxo.txid.clone(),
                vout: input.utxo.vout,
                value: input.utxo.value,
                script_pubkey: hex::encode(input.output.script_pubkey.as_bytes()),
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: tx_inputs,
            output: vec![TxOut {
                value: Amount::from_sat(send_amount),
                script_pubkey: destination.script_pubkey(),
            }],
        };

        let mut psbt = Psbt::from_unsigned_tx(tx)
            .map_err(|e| CustodyError::InvalidTransaction(format!("PSBT creation failed: {}", e)))?;

        for (psbt_input, input) in psbt.inputs.iter_mut().zip(inputs) {
            psbt_input.witness_utxo = Some(TxOut {
                value: Amount::from_sat(input.utxo.value),
                script_pubkey: input.output.script_pubkey.clone(),
            });
            psbt_input.tap_internal_key = Some(input.output.spend_info.internal_key());
            psbt_input.tap_merkle_root = input.output.spend_info.merkle_root();
            psbt_input.tap_scripts.insert(
                input.output.control_block.clone(),
                (input.output.script.clone(), LeafVersion::TapScript),
            );
        }

        let estimated_vsize = self.estimate_spend_vsize(inputs, destination, path);
        info!(
            "Built {:?} spend: {} input(s), {} sats in, fee {} sats (~{} vB)",
            path,
            inputs.len(),
            total_input,
            fee,
            estimated_vsize
        );

        Ok(UnsignedSpend {
            psbt,
            path,
            inputs: input_records,
            output: TxOutput {
                address: destination.to_string(),
                value: send_amount,
            },
            total_input_sats: total_input,
            fee_sats: fee,
            estimated_vsize,
        })
    }

    /// Spend a commitment output to `penalty`. The fee defaults to the
    /// estimate for a fully signed 2-of-2 input.
    pub fn build_slash(
        &self,
        commitment_tx: &Transaction,
        commitment: &CommitmentOutput,
        penalty: &Address,
        fee: Option<u64>,
    ) -> Result<Psbt> {
        let (vout, funding) = commitment_tx
            .output
            .iter()
            .enumerate()
            .find(|(_, txout)| txout.script_pubkey == commitment.script_pubkey)
            .ok_or_else(|| {
                CustodyError::InvalidTransaction(format!(
                    "Transaction {} has no commitment output",
                    commitment_tx.compute_txid()
                ))
            })?;

        let fee = fee.unwrap_or_else(|| {
            let vsize = BASE_VSIZE
                + estimate_multisig_input_vsize(&commitment.witness_script)
                + output_vsize(&penalty.script_pubkey());
            self.fee_rates.fee_for(vsize)
        });
        let available = funding.value.to_sat();
        let required = fee + DUST_LIMIT;
        if available < required {
            return Err(CustodyError::InsufficientFunds {
                available,
                required,
            });
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(commitment_tx.compute_txid(), vout as u32),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(available - fee),
                script_pubkey: penalty.script_pubkey(),
            }],
        };

        let mut psbt = Psbt::from_unsigned_tx(tx)
            .map_err(|e| CustodyError::InvalidTransaction(format!("PSBT creation failed: {}", e)))?;
        psbt.inputs[0].witness_utxo = Some(funding.clone());
        psbt.inputs[0].witness_script = Some(commitment.witness_script.clone());

        debug!(
            "Built slash spend of {}:{} to {} (fee {} sats)",
            commitment_tx.compute_txid(),
            vout,
            penalty,
            fee
        );
        Ok(psbt)
    }

    /// Compare the realized fee of a signed PSBT against `vsize × minimum`.
    /// The recommendation is never below `prior_fee` or the fee already paid.
    pub fn correct_fee_after_sign(&self, signed: &Psbt, prior_fee: u64) -> Result<FeeCheck> {
        let vsize = projected_vsize(signed)?;
        let paid = psbt_fee(signed)?;
        let required = self.fee_rates.relay_floor(vsize);

        if required <= paid {
            debug!("Fee {} sats covers {} vB (floor {})", paid, vsize, required);
            return Ok(FeeCheck::Sufficient { paid, vsize });
        }

        let recommended_fee = self
            .fee_rates
            .fee_for(vsize)
            .max(prior_fee)
            .max(paid);
        info!(
            "Fee {} sats below floor {} for {} vB, recommending {}",
            paid, required, vsize, recommended_fee
        );
        Ok(FeeCheck::Insufficient {
            paid,
            required,
            recommended_fee,
            vsize,
        })
    }
}
