//! Groth16 proof objects returned by the proving capability
//!
//! The prover hands back snarkjs-shaped JSON: decimal coordinates over the
//! BN254 base field, with a trailing projective `1` on every point. The
//! on-chain verifier takes eight words with the G2 limbs swapped:
//! ```text
//! [a.x, a.y, b.x.c1, b.x.c0, b.y.c1, b.y.c0, c.x, c.y]
//! ```

use ark_bn254::Fq;
use ark_ff::PrimeField;
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::crypto::field::FieldElement;
use crate::error::{PoolError, Result};

/// Expected proof data length in bytes.
/// A = 64 bytes (G1 uncompressed)
/// B = 128 bytes (G2 uncompressed)
/// C = 64 bytes (G1 uncompressed)
pub const PROOF_DATA_LEN: usize = 256;

/// Number of words in verifier calldata.
pub const CALLDATA_WORDS: usize = 8;

/// Groth16 proof as produced by snarkjs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    /// Point A ∈ G1: `[x, y, 1]`
    pub pi_a: Vec<String>,

    /// Point B ∈ G2: `[[x.c0, x.c1], [y.c0, y.c1], [1, 0]]`
    pub pi_b: Vec<Vec<String>>,

    /// Point C ∈ G1: `[x, y, 1]`
    pub pi_c: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

impl Groth16Proof {
    /// Verifier calldata ordering, each word checked against the base field.
    pub fn calldata(&self) -> Result<[BigUint; CALLDATA_WORDS]> {
        let a = g1_coords(&self.pi_a, "pi_a")?;
        let c = g1_coords(&self.pi_c, "pi_c")?;
        if self.pi_b.len() < 2 {
            return Err(PoolError::InvalidProofFormat(format!(
                "pi_b has {} rows, expected at least 2",
                self.pi_b.len()
            )));
        }
        let bx = g1_coords(&self.pi_b[0], "pi_b[0]")?;
        let by = g1_coords(&self.pi_b[1], "pi_b[1]")?;

        let [a0, a1] = a;
        let [bx0, bx1] = bx;
        let [by0, by1] = by;
        let [c0, c1] = c;
        Ok([a0, a1, bx1, bx0, by1, by0, c0, c1])
    }

    /// Calldata as decimal strings, the form contract clients submit.
    pub fn calldata_strings(&self) -> Result<Vec<String>> {
        Ok(self.calldata()?.iter().map(|w| w.to_string()).collect())
    }

    /// Serialize calldata as A || B || C, 32-byte big-endian words.
    pub fn to_bytes(&self) -> Result<[u8; PROOF_DATA_LEN]> {
        let mut bytes = [0u8; PROOF_DATA_LEN];
        for (i, word) in self.calldata()?.iter().enumerate() {
            let be = word.to_bytes_be();
            let end = (i + 1) * 32;
            bytes[end - be.len()..end].copy_from_slice(&be);
        }
        Ok(bytes)
    }
}

/// Proof plus the public signals the circuit exposed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOutput {
    pub proof: Groth16Proof,
    pub public_signals: Vec<FieldElement>,
}

fn g1_coords(point: &[String], name: &str) -> Result<[BigUint; 2]> {
    if point.len() < 2 {
        return Err(PoolError::InvalidProofFormat(format!(
            "{name} has {} coordinates, expected at least 2",
            point.len()
        )));
    }
    Ok([base_field_word(&point[0], name)?, base_field_word(&point[1], name)?])
}

fn base_field_word(s: &str, name: &str) -> Result<BigUint> {
    let word = BigUint::from_str_radix(s.trim(), 10)
        .map_err(|e| PoolError::InvalidProofFormat(format!("{name}: {s:?}: {e}")))?;
    if word >= BigUint::from(Fq::MODULUS) {
        return Err(PoolError::InvalidProofFormat(format!(
            "{name}: coordinate exceeds base field"
        )));
    }
    Ok(word)
}
