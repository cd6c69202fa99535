//! Signature shares and one-time key recovery.
//!
//! With one-time key `a`, nonce signature `(r, s)` and tag message `m_t`,
//! a share is `σ_t = (r·a + H(nonce) − m_t)·a⁻¹`. Each share satisfies
//! `σ_t·a + m_t = s·k`, so it is verifiable against the public key `A = a·G`
//! and the ephemeral x-coordinate `r`. Two shares for different tags give
//! `a = (m_up − m_down)·(σ_down − σ_up)⁻¹`.

use crate::field::{invert, message_scalar, point_from_pubkey, x_coordinate, FieldScalar};
use crate::keys::KeyPair;
use crate::nonce::{canonical, nonce_scalar, parse_nonce_signature, sign_nonce};
use bitcoin::secp256k1::PublicKey;
use custody_types::{CustodyError, NonceSignature, Result, ShareTag};
use generic_ec::{curves::Secp256k1, Point};
use tracing::warn;

/// `H(tag message)` mod `n`.
pub fn tag_scalar(tag: ShareTag) -> FieldScalar {
    message_scalar(tag.message().as_bytes())
}

/// Produce the share for `tag`. Fails unless the locally recomputed nonce
/// signature equals the registered one.
pub fn compute_share(
    one_time: &KeyPair,
    nonce: u8,
    registered: &NonceSignature,
    tag: ShareTag,
) -> Result<FieldScalar> {
    let local = canonical(&sign_nonce(one_time, nonce))?;
    if local != canonical(registered)? {
        return Err(CustodyError::InvalidKey(format!(
            "Nonce signature for nonce {} was not produced by key {}",
            nonce,
            one_time.public_key()
        )));
    }

    let (r, _) = parse_nonce_signature(registered)?;
    let a = one_time.scalar();
    let a_inv = invert(&a)
        .ok_or_else(|| CustodyError::InvalidKey("One-time key is zero".to_string()))?;

    Ok((r * a + nonce_scalar(nonce) - tag_scalar(tag)) * a_inv)
}

/// Check `x(s⁻¹·(m_t·G + σ·A)) == r`.
pub fn verify_share(
    one_time_pubkey: &PublicKey,
    signature: &NonceSignature,
    tag: ShareTag,
    share: &FieldScalar,
) -> Result<bool> {
    let (r, s) = parse_nonce_signature(signature)?;
    let a_point = point_from_pubkey(one_time_pubkey)?;
    let s_inv = match invert(&s) {
        Some(inv) => inv,
        None => return Ok(false),
    };

    let candidate = (Point::<Secp256k1>::generator() * tag_scalar(tag) + a_point * *share) * s_inv;
    Ok(x_coordinate(&candidate) == Some(r))
}

/// Solve for the one-time secret from both shares.
pub fn recover_secret(up: &FieldScalar, down: &FieldScalar) -> Option<FieldScalar> {
    let denominator = invert(&(*down - *up))?;
    let secret = (tag_scalar(ShareTag::Up) - tag_scalar(ShareTag::Down)) * denominator;
    if secret == FieldScalar::zero() {
        return None;
    }
    Some(secret)
}

/// Recover the one-time key and check it against the expected public key.
pub fn recover_key(
    up: &FieldScalar,
    down: &FieldScalar,
    expected: &PublicKey,
) -> Option<KeyPair> {
    let secret = recover_secret(up, down)?;
    let pair = KeyPair::from_scalar(&secret).ok()?;
    if pair.public_key() != *expected {
        warn!(
            "Recovered key {} does not match expected {}",
            pair.public_key(),
            expected
        );
        return None;
    }
    Some(pair)
}
