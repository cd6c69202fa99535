//! Key material: depositor one-time keys and the operator keyring.
//!
//! Supports:
//! - One-time key derivation bound to `(depositor secret, txid, nonce)`
//! - An operator BIP-32 tree with one child index per role

use crate::field::{point_from_pubkey, reduce, CurvePoint, FieldScalar};
use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, Keypair, PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use custody_types::{CustodyError, Network, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// A secp256k1 key pair.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn from_secret_key(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self { secret, public }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid secret key: {}", e)))?;
        Ok(Self::from_secret_key(secret))
    }

    pub fn from_scalar(scalar: &FieldScalar) -> Result<Self> {
        Self::from_slice(scalar.to_be_bytes().as_ref())
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.public.x_only_public_key().0
    }

    pub fn keypair(&self, secp: &Secp256k1<All>) -> Keypair {
        Keypair::from_secret_key(secp, &self.secret)
    }

    pub fn scalar(&self) -> FieldScalar {
        reduce(&self.secret.secret_bytes())
    }

    pub fn point(&self) -> Result<CurvePoint> {
        point_from_pubkey(&self.public)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.to_string())
            .finish_non_exhaustive()
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CustodyError::InvalidKey(format!("HMAC key rejected: {}", e)))?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// scrypt cost parameters for the root key: N = 2^10, r = 8, p = 1.
const ROOT_KEY_LOG_N: u8 = 10;
const ROOT_KEY_R: u32 = 8;
const ROOT_KEY_P: u32 = 1;

/// Per-UTXO root key: scrypt of the depositor's secret salted with the txid.
pub fn derive_root_key(depositor_secret: &[u8], txid: &str) -> Result<[u8; 32]> {
    if depositor_secret.is_empty() {
        return Err(CustodyError::InvalidKey(
            "Depositor secret is empty".to_string(),
        ));
    }
    let params = scrypt::Params::new(ROOT_KEY_LOG_N, ROOT_KEY_R, ROOT_KEY_P, 32)
        .map_err(|e| CustodyError::InvalidKey(format!("scrypt parameters rejected: {}", e)))?;
    let mut root = [0u8; 32];
    scrypt::scrypt(
        depositor_secret,
        txid.to_lowercase().as_bytes(),
        &params,
        &mut root,
    )
    .map_err(|e| CustodyError::InvalidKey(format!("scrypt failed: {}", e)))?;
    Ok(root)
}

/// One-time key for `(txid, nonce)`: HKDF-extract with the nonce byte as salt
/// and the root key as input keying material.
pub fn derive_one_time_key(depositor_secret: &[u8], txid: &str, nonce: u8) -> Result<KeyPair> {
    let root = derive_root_key(depositor_secret, txid)?;
    let okm = hmac_sha256(&[nonce], &root)?;
    let pair = KeyPair::from_slice(&okm)?;
    debug!(
        "Derived one-time key {} for {}:{}",
        pair.public_key(),
        txid,
        nonce
    );
    Ok(pair)
}

/// Parse a compressed or uncompressed public key from hex.
pub fn parse_public_key(value: &str) -> Result<PublicKey> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CustodyError::InvalidKey("Public key is empty".to_string()));
    }
    let bytes = hex::decode(trimmed)
        .map_err(|e| CustodyError::InvalidKey(format!("Invalid public key hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| CustodyError::InvalidKey(format!("Invalid public key: {}", e)))
}

// ============================================================================
// Operator keyring
// ============================================================================

/// Logical roles of operator keys; the discriminant is the BIP-32 child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Co-signs custody spends and commitment outputs.
    CoSigner = 0,
    /// Receives slashed collateral when no penalty address is given.
    PenaltySink = 1,
}

/// Long-lived operator key tree.
pub struct OperatorKeyring {
    master: Xpriv,
    secp: Secp256k1<All>,
}

impl OperatorKeyring {
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self> {
        if seed.len() < 16 {
            return Err(CustodyError::InvalidKey(format!(
                "Operator seed too short: {} bytes",
                seed.len()
            )));
        }
        let master = Xpriv::new_master(network.to_bitcoin_network(), seed)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid operator seed: {}", e)))?;
        Ok(Self {
            master,
            secp: Secp256k1::new(),
        })
    }

    pub fn from_seed_hex(seed_hex: &str, network: Network) -> Result<Self> {
        let seed = hex::decode(seed_hex.trim())
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid operator seed hex: {}", e)))?;
        Self::from_seed(&seed, network)
    }

    pub fn key(&self, role: KeyRole) -> Result<KeyPair> {
        let child = ChildNumber::from_normal_idx(role as u32)
            .map_err(|e| CustodyError::InvalidKey(format!("Invalid child index: {}", e)))?;
        let derived = self
            .master
            .derive_priv(&self.secp, &[child])
            .map_err(|e| CustodyError::InvalidKey(format!("Key derivation failed: {}", e)))?;
        Ok(KeyPair::from_secret_key(derived.private_key))
    }

    pub fn co_signer(&self) -> Result<KeyPair> {
        self.key(KeyRole::CoSigner)
    }
}
