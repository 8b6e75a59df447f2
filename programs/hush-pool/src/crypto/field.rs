//! BN254 scalar field elements
//!
//! Every commitment, nullifier, tree node and witness value lives in the
//! BN254 scalar field (r). The canonical text form is the base-10 integer,
//! which is what circom witness JSON carries.
//!
//! r = 21888242871839275222246405745257275088548364400416034343698204186575808495617

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, Zero};
use num_bigint::BigUint;
use num_traits::Num;
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PoolError, Result};

/// Bytes drawn for a random field element. 31 bytes keep the value below r.
pub const RANDOM_BYTES: usize = 31;

/// BN254 scalar field modulus (r), big-endian.
pub const BN254_SCALAR_MODULUS_BE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29,
    0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91,
    0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// An element of the BN254 scalar field.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(pub(crate) Fr);

impl FieldElement {
    pub const fn from_fr(fr: Fr) -> Self {
        Self(fr)
    }

    pub fn into_fr(self) -> Fr {
        self.0
    }

    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sample a uniformly random element from 31 little-endian bytes.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; RANDOM_BYTES];
        rng.fill_bytes(&mut bytes);
        Self(Fr::from(BigUint::from_bytes_le(&bytes)))
    }

    /// Parse a canonical base-10 string.
    pub fn from_decimal(s: &str) -> Result<Self> {
        let value = BigUint::from_str_radix(s.trim(), 10)
            .map_err(|e| PoolError::InvalidFieldElement(format!("{s:?}: {e}")))?;
        Self::from_biguint(value)
    }

    /// Parse a `0x`-prefixed hex string (addresses, raw hashes).
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .trim()
            .strip_prefix("0x")
            .or_else(|| s.trim().strip_prefix("0X"))
            .ok_or_else(|| PoolError::InvalidFieldElement(format!("{s:?}: missing 0x prefix")))?;
        if digits.is_empty() {
            return Err(PoolError::InvalidFieldElement(format!("{s:?}: empty hex")));
        }
        let value = BigUint::from_str_radix(digits, 16)
            .map_err(|e| PoolError::InvalidFieldElement(format!("{s:?}: {e}")))?;
        Self::from_biguint(value)
    }

    /// Decode 32 big-endian bytes. Values at or above r are rejected.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Result<Self> {
        Self::from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Encode as 32 big-endian bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let bytes = self.0.into_bigint().to_bytes_be();
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from(self.0)
    }

    /// `0x`-prefixed, zero-padded 32-byte hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    fn from_biguint(value: BigUint) -> Result<Self> {
        if value >= modulus() {
            return Err(PoolError::InvalidFieldElement(format!(
                "{value} is not below the field modulus"
            )));
        }
        Ok(Self(Fr::from(value)))
    }
}

/// The scalar field modulus as a big integer.
pub fn modulus() -> BigUint {
    BigUint::from_bytes_be(&BN254_SCALAR_MODULUS_BE)
}

/// Check a 32-byte big-endian value is a canonical scalar.
pub fn is_valid_scalar(bytes: &[u8; 32]) -> bool {
    bytes < &BN254_SCALAR_MODULUS_BE
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(Fr::from(value))
    }
}

impl From<u128> for FieldElement {
    fn from(value: u128) -> Self {
        Self(Fr::from(value))
    }
}

impl From<Fr> for FieldElement {
    fn from(fr: Fr) -> Self {
        Self(fr)
    }
}

impl FromStr for FieldElement {
    type Err = PoolError;

    /// Accepts decimal, or hex with a `0x` prefix.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            Self::from_hex(trimmed)
        } else {
            Self::from_decimal(trimmed)
        }
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({self})")
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Short prefix for logs. Never log full secret material.
pub(crate) fn short(value: &FieldElement) -> String {
    let full = value.to_string();
    if full.len() > 10 {
        format!("{}..", &full[..10])
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: &str = "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_modulus_matches_arkworks() {
        assert_eq!(modulus(), BigUint::from(Fr::MODULUS));
        assert_eq!(modulus().to_string(), R);
    }

    #[test]
    fn test_decimal_rejects_modulus() {
        assert!(FieldElement::from_decimal(R).is_err());
        let below = "21888242871839275222246405745257275088548364400416034343698204186575808495616";
        let fe = FieldElement::from_decimal(below).unwrap();
        assert_eq!(fe.to_string(), below);
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        assert!(FieldElement::from_decimal("12ab").is_err());
        assert!(FieldElement::from_decimal("").is_err());
        assert!(FieldElement::from_decimal("-5").is_err());
    }

    #[test]
    fn test_hex_address_lift() {
        let addr = "0x00000000000000000000000000000000000000ff";
        assert_eq!(FieldElement::from_hex(addr).unwrap(), FieldElement::from(255u64));
        assert!(FieldElement::from_hex("ff").is_err());
        assert!(FieldElement::from_hex("0x").is_err());
    }

    #[test]
    fn test_be_bytes_encoding() {
        let fe = FieldElement::from(0x0102030405060708u64);
        let bytes = fe.to_be_bytes();
        assert!(bytes[..24].iter().all(|&b| b == 0));
        assert_eq!(&bytes[24..], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(FieldElement::from_be_bytes(&bytes).unwrap(), fe);
        assert!(FieldElement::from_be_bytes(&BN254_SCALAR_MODULUS_BE).is_err());
    }

    #[test]
    fn test_scalar_validity() {
        assert!(is_valid_scalar(&[0u8; 32]));
        assert!(is_valid_scalar(&FieldElement::from(12345u64).to_be_bytes()));
        assert!(!is_valid_scalar(&BN254_SCALAR_MODULUS_BE));
        assert!(!is_valid_scalar(&[0xffu8; 32]));
    }

    #[test]
    fn test_random_elements_differ() {
        let mut rng = rand::thread_rng();
        let a = FieldElement::random(&mut rng);
        let b = FieldElement::random(&mut rng);
        assert_ne!(a, b);
        assert!(a.to_biguint().bits() <= 8 * RANDOM_BYTES as u64);
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let fe = FieldElement::from(42u64);
        assert_eq!(serde_json::to_string(&fe).unwrap(), "\"42\"");
        let back: FieldElement = serde_json::from_str("\"0x2a\"").unwrap();
        assert_eq!(back, fe);
        assert!(serde_json::from_str::<FieldElement>("42").is_err());
    }
}
