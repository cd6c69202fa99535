//! Deterministic keys, addresses and indexer records.

use bitcoin::Address;
use custody_bitcoin::{Utxo, UtxoStatus};
use custody_crypto::{KeyPair, KeyRole, OperatorKeyring};
use custody_types::Network;
use std::str::FromStr;

pub const OPERATOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";
pub const DEPOSITOR_SECRET: &[u8] = b"depositor wallet secret for tests";

pub fn operator_key() -> KeyPair {
    OperatorKeyring::from_seed_hex(OPERATOR_SEED, Network::Testnet)
        .unwrap()
        .key(KeyRole::CoSigner)
        .unwrap()
}

pub fn depositor_key() -> KeyPair {
    KeyPair::from_slice(&[0x5a; 32]).unwrap()
}

/// Deterministic 64-hex-char txid.
pub fn deposit_txid(seq: u64) -> String {
    format!("{:064x}", 0xdead_0000_u64 + seq)
}

pub fn esplora_utxo(txid: &str, vout: u32, value: u64, height: Option<u64>) -> Utxo {
    Utxo {
        txid: txid.to_string(),
        vout,
        value,
        status: UtxoStatus {
            confirmed: height.is_some(),
            block_height: height,
        },
    }
}

pub fn destination_address() -> Address {
    Address::from_str("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx")
        .unwrap()
        .require_network(bitcoin::Network::Testnet)
        .unwrap()
}

pub fn penalty_address() -> Address {
    Address::from_str("tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3q0sl5k7")
        .unwrap()
        .require_network(bitcoin::Network::Testnet)
        .unwrap()
}
