//! Scalar field helpers over the secp256k1 group order.

use bitcoin::secp256k1::PublicKey;
use custody_types::{CustodyError, Result};
use generic_ec::{curves::Secp256k1, Point, Scalar};
use sha2::{Digest, Sha256};

/// Scalar modulo the secp256k1 group order `n`.
pub type FieldScalar = Scalar<Secp256k1>;

/// Point on secp256k1.
pub type CurvePoint = Point<Secp256k1>;

/// Reduce big-endian bytes modulo `n`.
pub fn reduce(bytes: &[u8]) -> FieldScalar {
    Scalar::from_be_bytes_mod_order(bytes)
}

/// Modular inverse; `None` for zero.
pub fn invert(value: &FieldScalar) -> Option<FieldScalar> {
    value.invert()
}

/// `SHA-256(message)` interpreted as a big-endian integer mod `n`.
pub fn message_scalar(message: &[u8]) -> FieldScalar {
    reduce(&Sha256::digest(message))
}

/// Parse a big-endian hex scalar. Short encodings are left-padded; values
/// at or above `n` are rejected rather than silently reduced.
pub fn scalar_from_hex(value: &str) -> Result<FieldScalar> {
    let trimmed = value.trim().trim_start_matches("0x");
    if trimmed.is_empty() || trimmed.len() > 64 {
        return Err(CustodyError::Serialization(format!(
            "Invalid scalar length: {} hex chars",
            trimmed.len()
        )));
    }
    let padded = format!("{:0>64}", trimmed);
    let bytes = hex::decode(&padded)
        .map_err(|e| CustodyError::Serialization(format!("Invalid scalar hex: {}", e)))?;
    Scalar::from_be_bytes(&bytes)
        .map_err(|_| CustodyError::Serialization("Scalar out of range".to_string()))
}

/// 32-byte big-endian lowercase hex.
pub fn scalar_to_hex(value: &FieldScalar) -> String {
    hex::encode(value.to_be_bytes().as_ref())
}

pub fn point_from_pubkey(pubkey: &PublicKey) -> Result<CurvePoint> {
    Point::from_bytes(pubkey.serialize())
        .map_err(|_| CustodyError::InvalidKey(format!("Not a curve point: {}", pubkey)))
}

pub fn pubkey_from_point(point: &CurvePoint) -> Result<PublicKey> {
    PublicKey::from_slice(point.to_bytes(true).as_ref())
        .map_err(|e| CustodyError::InvalidKey(format!("Point is not a public key: {}", e)))
}

/// Affine x-coordinate reduced mod `n`, as used for the ECDSA `r` value.
pub fn x_coordinate(point: &CurvePoint) -> Option<FieldScalar> {
    if *point == Point::zero() {
        return None;
    }
    let encoded = point.to_bytes(true);
    let bytes: &[u8] = encoded.as_ref();
    bytes.get(1..33).map(reduce)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_HEX: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    #[test]
    fn test_reduce_wraps_at_order() {
        let order = hex::decode(ORDER_HEX).unwrap();
        assert_eq!(reduce(&order), FieldScalar::zero());

        let mut plus_one = order.clone();
        plus_one[31] += 1;
        assert_eq!(reduce(&plus_one), FieldScalar::one());
    }

    #[test]
    fn test_invert() {
        let seven = reduce(&[7]);
        let inv = invert(&seven).unwrap();
        assert_eq!(seven * inv, FieldScalar::one());
        assert!(invert(&FieldScalar::zero()).is_none());
    }

    #[test]
    fn test_hex_round_trip_and_padding() {
        let value = reduce(&[0x01, 0x02]);
        let encoded = scalar_to_hex(&value);
        assert_eq!(encoded.len(), 64);
        assert_eq!(scalar_from_hex(&encoded).unwrap(), value);
        assert_eq!(scalar_from_hex("102").unwrap(), value);
    }

    #[test]
    fn test_hex_rejects_out_of_range() {
        assert!(scalar_from_hex(ORDER_HEX).is_err());
        assert!(scalar_from_hex("").is_err());
        assert!(scalar_from_hex("zz").is_err());
    }

    #[test]
    fn test_generator_x_coordinate() {
        let g = Point::<Secp256k1>::generator() * FieldScalar::one();
        let x = x_coordinate(&g).unwrap();
        assert_eq!(
            scalar_to_hex(&x),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert!(x_coordinate(&Point::zero()).is_none());
    }
}
