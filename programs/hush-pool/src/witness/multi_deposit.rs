//! Batched deposit witness (8 slots)
//!
//! Real commitments occupy a contiguous prefix of the batch; the rest is
//! zero-leaf padding that the tree does not store:
//! ```text
//! [c0, c1, c2, 0, 0, 0, 0, 0]   ok, 3 leaves
//! [c0, 0, c2, 0, 0, 0, 0, 0]    rejected at slot 2
//! [0, 0, 0, 0, 0, 0, 0, 0]      ok, no leaves, tree untouched
//! ```

use std::ops::Range;

use serde::Serialize;
use tracing::{debug, warn};

use super::{abort, CircuitWitness};
use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};
use crate::prover::Circuit;
use crate::state::merkle_tree::MerkleAccumulator;

/// Fixed batch width of the `MultiDeposit` circuit.
pub const BATCH_SIZE: usize = 8;

/// Input for the `MultiDeposit` circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiDepositWitness {
    pub old_root: FieldElement,
    /// First slot's leaf index
    pub index: u64,
    /// Always `BATCH_SIZE` entries, padding included
    pub commitments: Vec<FieldElement>,
    /// Slot `i`'s path, taken right after slot `i` was applied
    pub path_elements: Vec<Vec<FieldElement>>,
    #[serde(skip)]
    real: usize,
}

impl MultiDepositWitness {
    /// Real (non-padding) commitments in the batch.
    pub fn real_count(&self) -> usize {
        self.real
    }

    /// Leaf indices assigned to the real commitments, in slot order.
    pub fn leaf_indices(&self) -> Range<u64> {
        self.index..self.index + self.real as u64
    }
}

impl CircuitWitness for MultiDepositWitness {
    fn circuit(&self) -> Circuit {
        Circuit::MultiDeposit
    }

    fn inserted(&self) -> usize {
        self.real
    }
}

/// Check the padding rule and return the number of real commitments.
pub fn check_batch_padding(commitments: &[FieldElement], zero_leaf: FieldElement) -> Result<usize> {
    if commitments.len() > BATCH_SIZE {
        return Err(PoolError::BatchTooLarge {
            len: commitments.len(),
            max: BATCH_SIZE,
        });
    }

    let real = commitments
        .iter()
        .take_while(|c| **c != zero_leaf)
        .count();
    if let Some(offset) = commitments[real..].iter().position(|c| *c != zero_leaf) {
        let slot = real + offset;
        warn!(slot, "batch rejected: commitment after padding");
        return Err(PoolError::InvalidBatchPadding { slot });
    }
    Ok(real)
}

/// Insert a batch and build its witness.
///
/// The batch is validated in full before the tree is touched. The whole
/// 8-slot window must fit in the tree since padding slots also need
/// paths. On error the tree is left as it was.
pub fn build_multi_deposit<H: PoolHasher>(
    tree: &mut MerkleAccumulator<H>,
    commitments: &[FieldElement],
) -> Result<MultiDepositWitness> {
    // ========== VALIDATION ==========

    let zero_leaf = tree.zero_leaf();
    let real = check_batch_padding(commitments, zero_leaf)?;

    let index = tree.total_elements();
    if index + BATCH_SIZE as u64 > tree.capacity() {
        warn!(index, capacity = tree.capacity(), "batch rejected: not enough room");
        return Err(PoolError::TreeFull);
    }

    // ========== MERKLE TREE UPDATE ==========

    let old_root = tree.root();
    let mut slots = commitments.to_vec();
    slots.resize(BATCH_SIZE, zero_leaf);

    let mut path_elements = Vec::with_capacity(BATCH_SIZE);
    for (i, leaf) in slots.iter().enumerate() {
        let slot_index = index + i as u64;
        let path = if i < real {
            tree.insert(*leaf, false).and_then(|_| tree.path(slot_index))
        } else {
            tree.padding_path(slot_index)
        };
        match path {
            Ok(path) => path_elements.push(path),
            Err(e) => {
                let inserted = (tree.total_elements() - index) as usize;
                return abort(tree, inserted, e);
            }
        }
    }

    debug!(index, real, root = %tree.root(), "multi-deposit witness built");
    Ok(MultiDepositWitness {
        old_root,
        index,
        commitments: slots,
        path_elements,
        real,
    })
}
