//! Error taxonomy shared by every custody crate.

use thiserror::Error;

/// Result alias used across the custody crates.
pub type Result<T> = std::result::Result<T, CustodyError>;

/// Errors raised by script derivation, commitment bookkeeping, recovery and
/// transaction assembly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CustodyError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid lock: {lock_blocks} blocks (must be within 1..=65535)")]
    InvalidLock { lock_blocks: i64 },

    #[error("Commitment mismatch for {txid}:{nonce}: expected {expected}, got {actual}")]
    CommitmentMismatch {
        txid: String,
        nonce: u8,
        expected: String,
        actual: String,
    },

    #[error("Commitment not found: {txid}:{nonce}")]
    CommitmentNotFound { txid: String, nonce: u8 },

    #[error("Share verification failed for {txid}:{nonce} ({tag}): {reason}")]
    ShareVerificationFailed {
        txid: String,
        nonce: u8,
        tag: String,
        reason: String,
    },

    #[error("Share for {txid}:{nonce} ({tag}) already recorded with a different value")]
    ShareConflict { txid: String, nonce: u8, tag: String },

    #[error("Insufficient shares for {txid}:{nonce}: have [{present}]")]
    InsufficientShares {
        txid: String,
        nonce: u8,
        present: String,
    },

    #[error("Recovered key for {txid}:{nonce} does not match the committed one-time key")]
    RecoveryInconsistent { txid: String, nonce: u8 },

    #[error("No spendable inputs")]
    NoSpendableInputs,

    #[error("Insufficient funds: have {available} sats, need {required} sats (including fee)")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Refused by policy: input {txid} ({reason})")]
    RefusedByPolicy { txid: String, reason: String },

    #[error("No UTXO can be withdrawn (nothing above {dust_floor} sats)")]
    NoUtxoAvailable { dust_floor: u64 },

    #[error("Fee still below minimum after correction: paid {paid} sats, need {required} sats")]
    FeeCorrectionExhausted { paid: u64, required: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("External service failure: {0}")]
    ExternalServiceFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CustodyError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CustodyError::ExternalServiceFailure(_))
    }
}

impl From<serde_json::Error> for CustodyError {
    fn from(e: serde_json::Error) -> Self {
        CustodyError::Serialization(e.to_string())
    }
}
