//! Commitment nonce signature.
//!
//! Every share for a commitment is bound to the ephemeral point of a single
//! ECDSA signature by the one-time key over `SHA-256([nonce])`. The signature
//! uses RFC-6979 deterministic nonces, so signing the same nonce byte with
//! the same key always reproduces the same `(r, s)`. This is the only place
//! that ephemeral value is produced.

use crate::field::{reduce, scalar_from_hex, scalar_to_hex, FieldScalar};
use crate::keys::KeyPair;
use bitcoin::secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1};
use custody_types::{CustodyError, NonceSignature, Result};
use sha2::{Digest, Sha256};

/// `SHA-256([nonce])`.
pub fn nonce_digest(nonce: u8) -> [u8; 32] {
    Sha256::digest([nonce]).into()
}

pub fn nonce_scalar(nonce: u8) -> FieldScalar {
    reduce(&nonce_digest(nonce))
}

/// Sign the nonce digest with the one-time key (RFC-6979, low-s).
pub fn sign_nonce(one_time: &KeyPair, nonce: u8) -> NonceSignature {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(nonce_digest(nonce));
    let compact = secp
        .sign_ecdsa(&message, one_time.secret_key())
        .serialize_compact();
    NonceSignature {
        r: hex::encode(&compact[..32]),
        s: hex::encode(&compact[32..]),
    }
}

/// Decode `(r, s)` as field scalars.
pub fn parse_nonce_signature(signature: &NonceSignature) -> Result<(FieldScalar, FieldScalar)> {
    let r = scalar_from_hex(&signature.r)?;
    let s = scalar_from_hex(&signature.s)?;
    if r == FieldScalar::zero() || s == FieldScalar::zero() {
        return Err(CustodyError::Serialization(
            "Nonce signature has a zero component".to_string(),
        ));
    }
    Ok((r, s))
}

/// Check the nonce signature against the one-time public key.
pub fn verify_nonce_signature(
    one_time_pubkey: &PublicKey,
    nonce: u8,
    signature: &NonceSignature,
) -> Result<()> {
    let (r, s) = parse_nonce_signature(signature)?;
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r.to_be_bytes().as_ref());
    compact[32..].copy_from_slice(s.to_be_bytes().as_ref());
    let mut sig = Signature::from_compact(&compact)
        .map_err(|e| CustodyError::Serialization(format!("Invalid nonce signature: {}", e)))?;
    sig.normalize_s();

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&Message::from_digest(nonce_digest(nonce)), &sig, one_time_pubkey)
        .map_err(|_| {
            CustodyError::InvalidKey(format!(
                "Nonce signature does not verify under {}",
                one_time_pubkey
            ))
        })
}

/// Canonical form used for equality checks between recomputed and stored signatures.
pub fn canonical(signature: &NonceSignature) -> Result<NonceSignature> {
    let (r, s) = parse_nonce_signature(signature)?;
    Ok(NonceSignature {
        r: scalar_to_hex(&r),
        s: scalar_to_hex(&s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyPair {
        KeyPair::from_slice(&Sha256::digest(b"one-time key")).unwrap()
    }

    #[test]
    fn test_signature_is_deterministic() {
        let pair = key();
        assert_eq!(sign_nonce(&pair, 7), sign_nonce(&pair, 7));
        assert_ne!(sign_nonce(&pair, 7).r, sign_nonce(&pair, 8).r);
    }

    #[test]
    fn test_signature_verifies() {
        let pair = key();
        let sig = sign_nonce(&pair, 7);
        verify_nonce_signature(&pair.public_key(), 7, &sig).unwrap();
        assert!(verify_nonce_signature(&pair.public_key(), 8, &sig).is_err());

        let stranger = KeyPair::from_slice(&[5u8; 32]).unwrap();
        assert!(verify_nonce_signature(&stranger.public_key(), 7, &sig).is_err());
    }

    #[test]
    fn test_zero_component_rejected() {
        let sig = NonceSignature {
            r: "00".repeat(32),
            s: "01".to_string(),
        };
        assert!(parse_nonce_signature(&sig).is_err());
    }

    #[test]
    fn test_canonical_pads() {
        let sig = NonceSignature {
            r: "1".to_string(),
            s: "0x2".to_string(),
        };
        let canon = canonical(&sig).unwrap();
        assert_eq!(canon.r.len(), 64);
        assert!(canon.s.ends_with("02"));
    }
}
