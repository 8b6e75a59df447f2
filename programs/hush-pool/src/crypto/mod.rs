//! Cryptographic primitives for the Hush pool
//!
//! Field encoding, the Poseidon and Pedersen hash capabilities, and the
//! Groth16 proof objects handed back by the external prover.

pub mod field;
pub mod groth16;
pub mod pedersen;
pub mod poseidon;

pub use field::FieldElement;
pub use groth16::{Groth16Proof, ProofOutput};
pub use pedersen::{pedersen_hash, CircomPedersen};
pub use poseidon::{compute_zero_values, is_zero_leaf, CircomPoseidon, PoolHasher, ZERO_LEAF};
