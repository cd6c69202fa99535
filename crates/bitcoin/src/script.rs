//! Custody and commitment script derivation.
//!
//! Supports:
//! - TLSC (time-locked self-custody) tapscript with a cooperative and a
//!   unilateral branch, wrapped in a single-leaf P2TR output whose internal
//!   key is the BIP-341 NUMS point
//! - 2-of-2 commitment multisig wrapped in P2WSH

use bitcoin::opcodes::all::{
    OP_1SUB, OP_CHECKMULTISIG, OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CSV, OP_DEPTH, OP_DROP,
    OP_ELSE, OP_ENDIF, OP_IF,
};
use bitcoin::script::{Builder, Instruction};
use bitcoin::secp256k1::{PublicKey, Secp256k1, VerifyOnly, XOnlyPublicKey};
use bitcoin::taproot::{ControlBlock, LeafVersion, TapLeafHash, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Address, Script, ScriptBuf};
use custody_types::{CustodyError, Network, Result};

/// x-only BIP-341 "nothing up my sleeve" point; no key-path spend exists.
pub const NUMS_INTERNAL_KEY: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a,
    0x5e, 0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80,
    0x3a, 0xc0,
];

/// Largest lock expressible as a BIP-68 height-based relative lock.
pub const MAX_LOCK_BLOCKS: u32 = u16::MAX as u32;

/// A derived custody output with everything needed to spend it.
#[derive(Debug, Clone)]
pub struct CustodyOutput {
    pub lock_blocks: u32,
    pub script: ScriptBuf,
    pub spend_info: TaprootSpendInfo,
    pub control_block: ControlBlock,
    pub script_pubkey: ScriptBuf,
    pub address: Address,
}

impl CustodyOutput {
    pub fn leaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.script, LeafVersion::TapScript)
    }
}

/// A derived commitment output.
#[derive(Debug, Clone)]
pub struct CommitmentOutput {
    pub witness_script: ScriptBuf,
    pub script_pubkey: ScriptBuf,
    pub address: Address,
}

/// Interpret a 32-byte x-only or 33/65-byte SEC key as x-only.
pub fn x_only_from_slice(bytes: &[u8]) -> Result<XOnlyPublicKey> {
    match bytes.len() {
        0 => Err(CustodyError::InvalidKey("Public key is empty".to_string())),
        32 => XOnlyPublicKey::from_slice(bytes)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid x-only key: {}", e))),
        _ => PublicKey::from_slice(bytes)
            .map(|pk| pk.x_only_public_key().0)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid public key: {}", e))),
    }
}

fn validate_lock(lock_blocks: u32) -> Result<()> {
    if lock_blocks == 0 || lock_blocks > MAX_LOCK_BLOCKS {
        return Err(CustodyError::InvalidLock {
            lock_blocks: i64::from(lock_blocks),
        });
    }
    Ok(())
}

/// Pure script and address derivation.
pub struct ScriptFactory {
    secp: Secp256k1<VerifyOnly>,
    internal_key: XOnlyPublicKey,
}

impl ScriptFactory {
    pub fn new() -> Result<Self> {
        let internal_key = XOnlyPublicKey::from_slice(&NUMS_INTERNAL_KEY)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid NUMS key: {}", e)))?;
        Ok(Self {
            secp: Secp256k1::verification_only(),
            internal_key,
        })
    }

    /// `DEPTH 1SUB IF <operator> CHECKSIGVERIFY ELSE <lock> CSV DROP ENDIF <depositor> CHECKSIG`
    pub fn custody_script(
        &self,
        operator: &XOnlyPublicKey,
        depositor: &XOnlyPublicKey,
        lock_blocks: u32,
    ) -> Result<ScriptBuf> {
        validate_lock(lock_blocks)?;
        Ok(Builder::new()
            .push_opcode(OP_DEPTH)
            .push_opcode(OP_1SUB)
            .push_opcode(OP_IF)
            .push_x_only_key(operator)
            .push_opcode(OP_CHECKSIGVERIFY)
            .push_opcode(OP_ELSE)
            .push_int(i64::from(lock_blocks))
            .push_opcode(OP_CSV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_ENDIF)
            .push_x_only_key(depositor)
            .push_opcode(OP_CHECKSIG)
            .into_script())
    }

    pub fn custody_output(
        &self,
        operator: &XOnlyPublicKey,
        depositor: &XOnlyPublicKey,
        lock_blocks: u32,
        network: Network,
    ) -> Result<CustodyOutput> {
        let script = self.custody_script(operator, depositor, lock_blocks)?;

        let spend_info = TaprootBuilder::new()
            .add_leaf(0, script.clone())
            .map_err(|e| CustodyError::InvalidKey(format!("Taproot leaf rejected: {}", e)))?
            .finalize(&self.secp, self.internal_key)
            .map_err(|_| CustodyError::InvalidKey("Taproot tree incomplete".to_string()))?;

        let control_block = spend_info
            .control_block(&(script.clone(), LeafVersion::TapScript))
            .ok_or_else(|| CustodyError::InvalidKey("Missing control block".to_string()))?;

        let address = Address::p2tr_tweaked(spend_info.output_key(), network.to_bitcoin_network());
        let script_pubkey = address.script_pubkey();

        Ok(CustodyOutput {
            lock_blocks,
            script,
            spend_info,
            control_block,
            script_pubkey,
            address,
        })
    }

    pub fn custody_address(
        &self,
        operator: &XOnlyPublicKey,
        depositor: &XOnlyPublicKey,
        lock_blocks: u32,
        network: Network,
    ) -> Result<Address> {
        Ok(self
            .custody_output(operator, depositor, lock_blocks, network)?
            .address)
    }

    /// One custody output per lock in `locks`, in the given order.
    pub fn deposit_outputs(
        &self,
        operator: &XOnlyPublicKey,
        depositor: &XOnlyPublicKey,
        locks: &[u32],
        network: Network,
    ) -> Result<Vec<CustodyOutput>> {
        locks
            .iter()
            .map(|lock| self.custody_output(operator, depositor, *lock, network))
            .collect()
    }

    /// `OP_2 <operator> <one_time> OP_2 OP_CHECKMULTISIG`; keys are not sorted.
    pub fn commitment_script(&self, operator: &PublicKey, one_time: &PublicKey) -> ScriptBuf {
        Builder::new()
            .push_int(2)
            .push_key(&bitcoin::PublicKey::new(*operator))
            .push_key(&bitcoin::PublicKey::new(*one_time))
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script()
    }

    pub fn commitment_output(
        &self,
        operator: &PublicKey,
        one_time: &PublicKey,
        network: Network,
    ) -> CommitmentOutput {
        let witness_script = self.commitment_script(operator, one_time);
        let address = Address::p2wsh(&witness_script, network.to_bitcoin_network());
        CommitmentOutput {
            script_pubkey: address.script_pubkey(),
            witness_script,
            address,
        }
    }
}

/// Data pushes of exactly `len` bytes, in script order.
pub(crate) fn pushed_keys(script: &Script, len: usize) -> Vec<Vec<u8>> {
    script
        .instructions()
        .filter_map(|ins| match ins {
            Ok(Instruction::PushBytes(bytes)) if bytes.len() == len => {
                Some(bytes.as_bytes().to_vec())
            }
            _ => None,
        })
        .collect()
}
