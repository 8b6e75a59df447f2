//! Circuit witness construction
//!
//! Each builder pairs the tree mutation with the witness assembled from
//! the same pre-state:
//! - `deposit`: one commitment against the previous root
//! - `multi_deposit`: eight slots, real commitments first, padding after
//! - `withdraw`: membership in the current tree (read-only)

pub mod deposit;
pub mod multi_deposit;
pub mod withdraw;

pub use deposit::{build_deposit, DepositWitness};
pub use multi_deposit::{build_multi_deposit, MultiDepositWitness, BATCH_SIZE};
pub use withdraw::{build_withdraw, WithdrawWitness};

use serde::Serialize;
use tracing::error;

use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};
use crate::prover::Circuit;
use crate::state::merkle_tree::MerkleAccumulator;

/// A witness ready to hand to the proving capability.
pub trait CircuitWitness: Serialize {
    /// Circuit this witness is input for.
    fn circuit(&self) -> Circuit;

    /// Leaves the builder inserted into the tree, i.e. how many to roll
    /// back if proving fails.
    fn inserted(&self) -> usize;

    /// Circuit input JSON.
    fn to_input(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Undo a builder's own insertions before surfacing `err`.
pub(crate) fn abort<H: PoolHasher, T>(
    tree: &mut MerkleAccumulator<H>,
    inserted: usize,
    err: PoolError,
) -> Result<T> {
    if let Err(undo) = tree.rollback(inserted) {
        error!(inserted, %undo, "failed to undo witness insertions");
    }
    Err(err)
}
