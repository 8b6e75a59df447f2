//! Hash functions for the Hush pool
//!
//! # Hash Function Architecture
//!
//! Tree nodes run Poseidon over the BN254 scalar field with circomlib
//! parameters, matching the circuits and the roots stored on-chain. Note
//! hashes are a separate slot of [`PoolHasher`]:
//! ```text
//! node       = Poseidon(left, right)          every hasher
//! commitment = Hc(secret, nonce)
//! nullifier  = Hc(secret, index)
//! ```
//!
//! [`CircomPedersen`](crate::crypto::pedersen::CircomPedersen) sets `Hc` to
//! the Baby Jubjub Pedersen hash the deposit/withdraw circuits check and is
//! the default. [`CircomPoseidon`] sets `Hc` to Poseidon as well; its notes
//! cannot be withdrawn through the Pedersen-based circuits.
//!
//! The construction is injected through [`PoolHasher`]. The tree, notes and
//! witness builders only depend on the trait.

use ark_bn254::Fr;
use ark_ff::MontFp;
use light_poseidon::{Poseidon, PoseidonHasher};

use crate::crypto::field::FieldElement;
use crate::error::Result;

/// Canonical empty leaf: `uint256(keccak256("HushHush")) % r`.
pub const ZERO_LEAF: FieldElement = FieldElement::from_fr(MontFp!(
    "10040938200627430310828075205244513358216211203724055178857443267945086138226"
));

/// Hash capability shared by the tree and the note model.
///
/// Implementations must be pure: the same inputs give the same digest in
/// every process.
pub trait PoolHasher {
    /// Compress two tree nodes into their parent.
    fn hash_two_to_one(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement>;

    /// Commitment hash, also used for nullifier derivation.
    fn hash_commitment(&self, x: &FieldElement, y: &FieldElement) -> Result<FieldElement>;
}

impl<H: PoolHasher + ?Sized> PoolHasher for &H {
    fn hash_two_to_one(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
        (**self).hash_two_to_one(left, right)
    }

    fn hash_commitment(&self, x: &FieldElement, y: &FieldElement) -> Result<FieldElement> {
        (**self).hash_commitment(x, y)
    }
}

/// circomlib-compatible Poseidon (t = 3, RF = 8, RP = 57) for nodes and
/// note hashes alike.
#[derive(Clone, Copy, Debug, Default)]
pub struct CircomPoseidon;

impl CircomPoseidon {
    fn poseidon2(a: &FieldElement, b: &FieldElement) -> Result<FieldElement> {
        let mut poseidon = Poseidon::<Fr>::new_circom(2)?;
        let digest = poseidon.hash(&[a.into_fr(), b.into_fr()])?;
        Ok(FieldElement::from_fr(digest))
    }
}

impl PoolHasher for CircomPoseidon {
    fn hash_two_to_one(&self, left: &FieldElement, right: &FieldElement) -> Result<FieldElement> {
        Self::poseidon2(left, right)
    }

    fn hash_commitment(&self, x: &FieldElement, y: &FieldElement) -> Result<FieldElement> {
        Self::poseidon2(x, y)
    }
}

/// Compute the empty-subtree hash for each level.
///
/// Level 0 = zero leaf, level depth = empty root.
/// These MUST match the circuit's zero values exactly.
pub fn compute_zero_values<H: PoolHasher>(
    hasher: &H,
    zero_leaf: FieldElement,
    depth: u8,
) -> Result<Vec<FieldElement>> {
    let mut zeros = Vec::with_capacity(depth as usize + 1);
    zeros.push(zero_leaf);

    let mut current = zero_leaf;
    for _ in 0..depth {
        current = hasher.hash_two_to_one(&current, &current)?;
        zeros.push(current);
    }

    Ok(zeros)
}

#[inline]
pub fn is_zero_leaf(value: &FieldElement) -> bool {
    *value == ZERO_LEAF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poseidon_circomlib_vector() {
        // circomlib: poseidon([1, 2])
        let h = CircomPoseidon
            .hash_two_to_one(&FieldElement::from(1u64), &FieldElement::from(2u64))
            .unwrap();
        assert_eq!(
            h.to_string(),
            "7853200120776062878684798364095072458815029376092732009249414926327459813530"
        );
    }

    #[test]
    fn test_hash_two_to_one_deterministic() {
        let left = FieldElement::from(11u64);
        let right = FieldElement::from(22u64);
        let h1 = CircomPoseidon.hash_two_to_one(&left, &right).unwrap();
        let h2 = CircomPoseidon.hash_two_to_one(&left, &right).unwrap();
        assert_eq!(h1, h2, "Hash should be deterministic");
    }

    #[test]
    fn test_hash_two_to_one_non_commutative() {
        let a = FieldElement::from(1u64);
        let b = FieldElement::from(2u64);
        let h1 = CircomPoseidon.hash_two_to_one(&a, &b).unwrap();
        let h2 = CircomPoseidon.hash_two_to_one(&b, &a).unwrap();
        assert_ne!(h1, h2, "Hash should not be commutative");
    }

    #[test]
    fn test_zero_leaf_constant() {
        assert_eq!(
            ZERO_LEAF.to_string(),
            "10040938200627430310828075205244513358216211203724055178857443267945086138226"
        );
        assert!(is_zero_leaf(&ZERO_LEAF));
        assert!(!is_zero_leaf(&FieldElement::zero()));
    }

    #[test]
    fn test_zero_values_ladder() {
        let zeros = compute_zero_values(&CircomPoseidon, ZERO_LEAF, 4).unwrap();
        assert_eq!(zeros.len(), 5);
        assert_eq!(zeros[0], ZERO_LEAF);
        for level in 1..zeros.len() {
            let expected = CircomPoseidon
                .hash_two_to_one(&zeros[level - 1], &zeros[level - 1])
                .unwrap();
            assert_eq!(zeros[level], expected);
        }
    }

    #[test]
    fn test_zero_values_deterministic() {
        let zeros1 = compute_zero_values(&CircomPoseidon, ZERO_LEAF, 10).unwrap();
        let zeros2 = compute_zero_values(&CircomPoseidon, ZERO_LEAF, 10).unwrap();
        assert_eq!(zeros1, zeros2);
    }

    #[test]
    fn test_hasher_by_reference() {
        let hasher = CircomPoseidon;
        let by_ref = &hasher;
        let a = FieldElement::from(5u64);
        assert_eq!(
            by_ref.hash_commitment(&a, &a).unwrap(),
            hasher.hash_commitment(&a, &a).unwrap()
        );
    }
}
