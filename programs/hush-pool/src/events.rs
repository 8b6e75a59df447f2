//! Ledger events consumed by the rebuilder

use serde::{Deserialize, Serialize};

use crate::crypto::field::FieldElement;

/// One accepted leaf, as emitted by the pool contract on every deposit
/// and multi-deposit slot (padding slots included).
///
/// The contract's raw argument names `_index`/`_commitment` are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    #[serde(alias = "_index")]
    pub index: u64,

    #[serde(alias = "_commitment")]
    pub commitment: FieldElement,
}

impl DepositEvent {
    pub fn new(index: u64, commitment: FieldElement) -> Self {
        Self { index, commitment }
    }
}
