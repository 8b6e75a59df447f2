//! Single deposit witness

use serde::Serialize;
use tracing::{debug, warn};

use super::{abort, CircuitWitness};
use crate::crypto::field::{short, FieldElement};
use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};
use crate::prover::Circuit;
use crate::state::merkle_tree::MerkleAccumulator;

/// Input for the `SingleDeposit` circuit.
///
/// `old_root`/`index` describe the tree before the insertion, the path
/// describes the leaf's position after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositWitness {
    pub old_root: FieldElement,
    pub index: u64,
    /// The circuit names this input in the plural even for one leaf.
    pub commitments: FieldElement,
    /// One path, wrapped to match the multi-deposit shape.
    pub path_elements: Vec<Vec<FieldElement>>,
}

impl CircuitWitness for DepositWitness {
    fn circuit(&self) -> Circuit {
        Circuit::SingleDeposit
    }

    fn inserted(&self) -> usize {
        1
    }
}

/// Insert `commitment` and build its deposit witness.
///
/// On error the tree is left as it was.
pub fn build_deposit<H: PoolHasher>(
    tree: &mut MerkleAccumulator<H>,
    commitment: FieldElement,
) -> Result<DepositWitness> {
    // ========== VALIDATION ==========

    if commitment == tree.zero_leaf() {
        warn!("deposit rejected: commitment is the zero leaf");
        return Err(PoolError::ZeroCommitment);
    }
    if tree.is_full() {
        return Err(PoolError::TreeFull);
    }

    // ========== MERKLE TREE UPDATE ==========

    let old_root = tree.root();
    let index = tree.total_elements();
    tree.insert(commitment, false)?;

    let path = match tree.path(index) {
        Ok(path) => path,
        Err(e) => return abort(tree, 1, e),
    };

    debug!(index, commitment = %short(&commitment), "deposit witness built");
    Ok(DepositWitness {
        old_root,
        index,
        commitments: commitment,
        path_elements: vec![path],
    })
}
