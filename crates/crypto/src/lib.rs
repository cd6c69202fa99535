//! Cryptographic core of the accountable custody engine.
//!
//! Supports:
//! - Scalar field arithmetic over the secp256k1 order
//! - One-time key derivation and the operator keyring
//! - The deterministic commitment nonce signature
//! - Share production, verification and key recovery

pub mod field;
pub mod keys;
pub mod nonce;
pub mod share;

pub use field::{
    invert, message_scalar, reduce, scalar_from_hex, scalar_to_hex, CurvePoint, FieldScalar,
};
pub use keys::{
    derive_one_time_key, derive_root_key, parse_public_key, KeyPair, KeyRole, OperatorKeyring,
};
pub use nonce::{nonce_digest, sign_nonce, verify_nonce_signature};
pub use share::{compute_share, recover_key, recover_secret, tag_scalar, verify_share};
