//! Commitment and signature-share records.
//!
//! Records are flat and keyed by their natural identifiers:
//! - a commitment by `(txid, nonce)`
//! - a share by `(txid, nonce, tag)`

use crate::error::CustodyError;
use crate::network::Network;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two fixed messages a share signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareTag {
    Up,
    Down,
}

impl ShareTag {
    pub const BOTH: [ShareTag; 2] = [ShareTag::Up, ShareTag::Down];

    /// The public message bound to this tag.
    pub fn message(&self) -> &'static str {
        match self {
            ShareTag::Up => "up",
            ShareTag::Down => "down",
        }
    }

    pub fn other(&self) -> ShareTag {
        match self {
            ShareTag::Up => ShareTag::Down,
            ShareTag::Down => ShareTag::Up,
        }
    }
}

impl std::fmt::Display for ShareTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::str::FromStr for ShareTag {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(ShareTag::Up),
            "down" => Ok(ShareTag::Down),
            _ => Err(CustodyError::Serialization(format!("Unknown share tag: {}", s))),
        }
    }
}

/// ECDSA signature `(r, s)` by the one-time key over `H(nonce)`.
/// Both scalars are 32-byte big-endian hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceSignature {
    pub r: String,
    pub s: String,
}

/// A registered accountable-custody commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// UTXO the commitment is tied to.
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
    pub nonce: u8,
    /// Compressed one-time public key (hex).
    pub one_time_pubkey: String,
    /// Depositor-signed commitment PSBT (hex).
    pub psbt: String,
    pub network: Network,
    pub nonce_signature: NonceSignature,
    pub created_at: DateTime<Utc>,
}

impl Commitment {
    pub fn store_key(&self) -> String {
        commitment_key(&self.txid, self.nonce)
    }
}

/// A published signature share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShare {
    pub txid: String,
    pub nonce: u8,
    pub tag: ShareTag,
    /// Scalar value, 32-byte big-endian hex.
    pub value: String,
}

// ============================================================================
// Store keys
// ============================================================================

pub fn commitment_prefix(txid: &str) -> String {
    format!("commitment/{}/", txid.to_lowercase())
}

pub fn commitment_key(txid: &str, nonce: u8) -> String {
    format!("{}{:02x}", commitment_prefix(txid), nonce)
}

pub fn share_prefix(txid: &str, nonce: u8) -> String {
    format!("share/{}/{:02x}/", txid.to_lowercase(), nonce)
}

pub fn share_key(txid: &str, nonce: u8, tag: ShareTag) -> String {
    format!("{}{}", share_prefix(txid, nonce), tag)
}

/// Most-recent list of commitments registered on a network.
pub fn recent_commitments_key(network: Network) -> String {
    format!("recent/{}", network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_messages() {
        assert_eq!(ShareTag::Up.message(), "up");
        assert_eq!(ShareTag::Down.to_string(), "down");
        assert_eq!(ShareTag::Up.other(), ShareTag::Down);
        assert_eq!("DOWN".parse::<ShareTag>().unwrap(), ShareTag::Down);
        assert!("sideways".parse::<ShareTag>().is_err());
    }

    #[test]
    fn test_keys_are_prefix_scoped() {
        let txid = "AB".repeat(32);
        let key = commitment_key(&txid, 7);
        assert!(key.starts_with(&commitment_prefix(&txid)));
        assert!(key.ends_with("/07"));
        assert_eq!(
            share_key(&txid, 7, ShareTag::Up),
            format!("share/{}/07/up", "ab".repeat(32))
        );
    }
}
