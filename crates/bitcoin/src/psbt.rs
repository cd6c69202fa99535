//! PSBT signing, finalization and size projection.
//!
//! Two input kinds occur:
//! - custody inputs: taproot script-path spends of the TLSC leaf
//! - commitment inputs: P2WSH 2-of-2 multisig
//!
//! The custody branch is read from the input sequence. A height-based
//! relative lock marks the unilateral branch; anything else is cooperative.

use crate::script::pushed_keys;
use crate::types::SpendPath;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::psbt::{Input, Psbt};
use bitcoin::secp256k1::{Message, Secp256k1, XOnlyPublicKey};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::taproot::{LeafVersion, TapLeafHash};
use bitcoin::{ecdsa, taproot, Sequence, Transaction, TxOut, Witness};
use custody_crypto::KeyPair;
use custody_types::{CustodyError, Result};
use tracing::debug;

/// Size of a BIP-340 signature with the default sighash.
const SCHNORR_SIG_LEN: usize = 64;
/// Upper bound of a DER signature plus sighash byte.
const ECDSA_SIG_MAX_LEN: usize = 73;

pub fn psbt_to_hex(psbt: &Psbt) -> String {
    hex::encode(psbt.serialize())
}

pub fn psbt_from_hex(value: &str) -> Result<Psbt> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| CustodyError::InvalidTransaction(format!("Invalid PSBT hex: {}", e)))?;
    Psbt::deserialize(&bytes)
        .map_err(|e| CustodyError::InvalidTransaction(format!("Invalid PSBT: {}", e)))
}

/// Branch of the custody leaf selected by an input's sequence.
pub fn spend_path_for(sequence: Sequence) -> SpendPath {
    if sequence.is_height_locked() {
        SpendPath::Unilateral
    } else {
        SpendPath::Cooperative
    }
}

fn prevouts(psbt: &Psbt) -> Result<Vec<TxOut>> {
    psbt.inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            input.witness_utxo.clone().ok_or_else(|| {
                CustodyError::InvalidTransaction(format!("Input {} has no witness UTXO", i))
            })
        })
        .collect()
}

fn input_mut(psbt: &mut Psbt, index: usize) -> Result<&mut Input> {
    psbt.inputs
        .get_mut(index)
        .ok_or_else(|| CustodyError::InvalidTransaction(format!("No input {}", index)))
}

/// Add `key`'s signature to every listed input it can sign. Returns the number
/// of signatures added.
pub fn sign_inputs(psbt: &mut Psbt, key: &KeyPair, inputs: &[usize]) -> Result<usize> {
    let secp = Secp256k1::new();
    let keypair = key.keypair(&secp);
    let x_only = key.x_only_public_key();
    let compressed = bitcoin::PublicKey::new(key.public_key());

    let tx = psbt.unsigned_tx.clone();
    let prevouts = prevouts(psbt)?;
    let mut cache = SighashCache::new(&tx);
    let mut added = 0;

    for &index in inputs {
        let input = input_mut(psbt, index)?;

        let leaves: Vec<(bitcoin::ScriptBuf, LeafVersion)> =
            input.tap_scripts.values().cloned().collect();
        for (script, version) in leaves {
            if !pushed_keys(&script, 32).contains(&x_only.serialize().to_vec()) {
                continue;
            }
            let leaf_hash = TapLeafHash::from_script(&script, version);
            let sighash = cache
                .taproot_script_spend_signature_hash(
                    index,
                    &Prevouts::All(&prevouts),
                    leaf_hash,
                    TapSighashType::Default,
                )
                .map_err(|e| CustodyError::InvalidTransaction(format!("Sighash error: {}", e)))?;
            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_schnorr_no_aux_rand(&message, &keypair);
            input.tap_script_sigs.insert(
                (x_only, leaf_hash),
                taproot::Signature {
                    signature,
                    sighash_type: TapSighashType::Default,
                },
            );
            added += 1;
        }

        if let Some(witness_script) = input.witness_script.clone() {
            if !pushed_keys(&witness_script, 33).contains(&compressed.to_bytes()) {
                continue;
            }
            let amount = input
                .witness_utxo
                .as_ref()
                .map(|utxo| utxo.value)
                .ok_or_else(|| {
                    CustodyError::InvalidTransaction(format!("Input {} has no witness UTXO", index))
                })?;
            let sighash = cache
                .p2wsh_signature_hash(index, &witness_script, amount, EcdsaSighashType::All)
                .map_err(|e| CustodyError::InvalidTransaction(format!("Sighash error: {}", e)))?;
            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&message, key.secret_key());
            input.partial_sigs.insert(
                compressed,
                ecdsa::Signature {
                    signature,
                    sighash_type: EcdsaSighashType::All,
                },
            );
            added += 1;
        }
    }

    debug!("Signed {} input(s) with {}", added, key.public_key());
    Ok(added)
}

/// Witness for one input from the signatures present. With `placeholders`,
/// missing signatures are filled with dummy bytes of maximal size so the
/// result can be measured.
fn build_witness(
    input: &Input,
    sequence: Sequence,
    placeholders: bool,
) -> Result<Option<Witness>> {
    if let Some((control_block, (script, version))) = input.tap_scripts.iter().next() {
        let leaf_hash = TapLeafHash::from_script(script, *version);
        let keys = pushed_keys(script, 32);
        let [operator, depositor] = keys.as_slice() else {
            return Err(CustodyError::InvalidTransaction(
                "Custody leaf must commit to two keys".to_string(),
            ));
        };

        let signature_for = |key: &[u8]| -> Result<Option<Vec<u8>>> {
            let x_only = XOnlyPublicKey::from_slice(key)
                .map_err(|e| CustodyError::InvalidKey(format!("Invalid leaf key: {}", e)))?;
            Ok(match input.tap_script_sigs.get(&(x_only, leaf_hash)) {
                Some(sig) => Some(sig.to_vec()),
                None if placeholders => Some(vec![0u8; SCHNORR_SIG_LEN]),
                None => None,
            })
        };

        let Some(depositor_sig) = signature_for(depositor.as_slice())? else {
            return Ok(None);
        };
        let mut witness = Witness::new();
        witness.push(depositor_sig);
        if spend_path_for(sequence) == SpendPath::Cooperative {
            let Some(operator_sig) = signature_for(operator.as_slice())? else {
                return Ok(None);
            };
            witness.push(operator_sig);
        }
        witness.push(script.as_bytes());
        witness.push(control_block.serialize());
        return Ok(Some(witness));
    }

    if let Some(witness_script) = &input.witness_script {
        let mut witness = Witness::new();
        witness.push(Vec::<u8>::new());
        for key in pushed_keys(witness_script, 33) {
            let pubkey = bitcoin::PublicKey::from_slice(&key)
                .map_err(|e| CustodyError::InvalidKey(format!("Invalid multisig key: {}", e)))?;
            match input.partial_sigs.get(&pubkey) {
                Some(sig) => witness.push(sig.to_vec()),
                None if placeholders => witness.push(vec![0u8; ECDSA_SIG_MAX_LEN]),
                None => return Ok(None),
            }
        }
        witness.push(witness_script.as_bytes());
        return Ok(Some(witness));
    }

    Err(CustodyError::InvalidTransaction(
        "Input is neither a custody nor a commitment spend".to_string(),
    ))
}

/// Finalize one input. Fails if a required signature is missing.
pub fn finalize_input(psbt: &mut Psbt, index: usize) -> Result<()> {
    let sequence = psbt
        .unsigned_tx
        .input
        .get(index)
        .map(|txin| txin.sequence)
        .ok_or_else(|| CustodyError::InvalidTransaction(format!("No input {}", index)))?;
    let input = input_mut(psbt, index)?;
    if input.final_script_witness.is_some() {
        return Ok(());
    }

    let witness = build_witness(input, sequence, false)?.ok_or_else(|| {
        CustodyError::InvalidTransaction(format!("Input {} is missing a signature", index))
    })?;

    input.final_script_witness = Some(witness);
    input.partial_sigs.clear();
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
    input.witness_script = None;
    Ok(())
}

pub fn finalize_all(psbt: &mut Psbt) -> Result<()> {
    for index in 0..psbt.inputs.len() {
        finalize_input(psbt, index)?;
    }
    Ok(())
}

pub fn is_finalized(psbt: &Psbt) -> bool {
    psbt.inputs
        .iter()
        .all(|input| input.final_script_witness.is_some())
}

/// Extract the network transaction from a fully finalized PSBT.
pub fn extract_transaction(psbt: &Psbt) -> Result<Transaction> {
    if !is_finalized(psbt) {
        return Err(CustodyError::InvalidTransaction(
            "PSBT is not finalized".to_string(),
        ));
    }
    let tx = psbt.clone().extract_tx_unchecked_fee_rate();
    debug!("Extracted transaction {}", serialize_hex(&tx));
    Ok(tx)
}

/// `Σ inputs − Σ outputs` in satoshis.
pub fn psbt_fee(psbt: &Psbt) -> Result<u64> {
    let input_total: u64 = prevouts(psbt)?.iter().map(|txout| txout.value.to_sat()).sum();
    let output_total: u64 = psbt
        .unsigned_tx
        .output
        .iter()
        .map(|txout| txout.value.to_sat())
        .sum();
    input_total.checked_sub(output_total).ok_or_else(|| {
        CustodyError::InvalidTransaction(format!(
            "Outputs ({}) exceed inputs ({})",
            output_total, input_total
        ))
    })
}

/// Virtual size the transaction will have once every required signature is
/// present. Final witnesses are measured as they are.
pub fn projected_vsize(psbt: &Psbt) -> Result<u64> {
    let mut tx = psbt.unsigned_tx.clone();
    for (index, input) in psbt.inputs.iter().enumerate() {
        let witness = match &input.final_script_witness {
            Some(witness) => witness.clone(),
            None => build_witness(input, tx.input[index].sequence, true)?.ok_or_else(|| {
                CustodyError::InvalidTransaction(format!("Input {} cannot be projected", index))
            })?,
        };
        tx.input[index].witness = witness;
    }
    Ok(tx.vsize() as u64)
}
