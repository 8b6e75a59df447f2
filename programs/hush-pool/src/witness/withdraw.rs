//! Withdraw witness
//!
//! Proves membership in the current tree; the tree is not mutated. The
//! nullifier is derived inside the circuit from `secret` and `index`.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use super::CircuitWitness;
use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};
use crate::prover::Circuit;
use crate::state::merkle_tree::MerkleAccumulator;
use crate::state::note::Note;

/// Input for the `Withdraw` circuit.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawWitness {
    /// Current root, not a pre-state root
    pub root: FieldElement,
    /// Ledger address as a field element
    pub receiver: FieldElement,
    pub fee: FieldElement,
    pub secret: FieldElement,
    pub nonce: FieldElement,
    pub index: u64,
    pub path_elements: Vec<FieldElement>,
}

impl CircuitWitness for WithdrawWitness {
    fn circuit(&self) -> Circuit {
        Circuit::Withdraw
    }

    fn inserted(&self) -> usize {
        0
    }
}

impl fmt::Debug for WithdrawWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithdrawWitness")
            .field("root", &self.root)
            .field("receiver", &self.receiver)
            .field("fee", &self.fee)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Build the withdraw witness for `note`, paying `fee` out of the note's
/// amount to whoever relays the proof.
///
/// `receiver` is a `0x` hex address.
pub fn build_withdraw<H: PoolHasher>(
    tree: &MerkleAccumulator<H>,
    note: &Note,
    receiver: &str,
    fee: u128,
) -> Result<WithdrawWitness> {
    // ========== VALIDATION ==========

    let index = note.index().ok_or(PoolError::IndexUnassigned)?;
    let leaf = tree.leaf(index).ok_or(PoolError::IndexOutOfRange {
        index,
        total: tree.total_elements(),
    })?;
    if leaf != note.commitment() {
        warn!(index, "withdraw rejected: leaf is not the note commitment");
        return Err(PoolError::CommitmentMismatch { index });
    }

    // Zero amount means the note does not track it
    if note.amount() != 0 && fee > note.amount() {
        return Err(PoolError::FeeExceedsAmount {
            fee,
            amount: note.amount(),
        });
    }

    let receiver = FieldElement::from_hex(receiver)?;

    // ========== WITNESS ==========

    let path_elements = tree.path(index)?;

    debug!(index, "withdraw witness built");
    Ok(WithdrawWitness {
        root: tree.root(),
        receiver,
        fee: FieldElement::from(fee),
        secret: note.secret(),
        nonce: note.nonce(),
        index,
        path_elements,
    })
}
