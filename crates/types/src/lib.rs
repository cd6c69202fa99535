//! Shared types for the accountable custody engine.

pub mod commitment;
pub mod error;
pub mod fee;
pub mod network;
pub mod utxo;

pub use commitment::{
    commitment_key, commitment_prefix, recent_commitments_key, share_key, share_prefix,
    Commitment, NonceSignature, ShareTag, SignatureShare,
};
pub use error::{CustodyError, Result};
pub use fee::{FeeRates, MIN_ABSOLUTE_FEE};
pub use network::Network;
pub use utxo::{is_locked, sort_deposits, Balance, DepositUtxo, DEFAULT_LOCK_SET};

/// Number of commitments returned by a listing when no limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Deposits below this value are never swept into a withdrawal.
pub const DEFAULT_DUST_FLOOR: u64 = 1_000;
