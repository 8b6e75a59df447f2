//! Unified error types for the Hush pool core
//!
//! Error codes are stable across versions for client compatibility.

use thiserror::Error;

use crate::crypto::field::FieldElement;
use crate::prover::{Circuit, ProverError};

#[derive(Debug, Error)]
pub enum PoolError {
    // ========== Note / Index Errors (7000-7009) ==========
    /// Nullifier or path requested before the note was bound to a leaf
    #[error("note index not assigned")]
    IndexUnassigned, // 7000

    /// A note index can only be bound once
    #[error("note already bound to index {assigned}, refusing {requested}")]
    IndexAlreadyAssigned { assigned: u64, requested: u64 }, // 7001

    /// Requested index is not a written leaf
    #[error("index {index} out of range, tree holds {total} leaves")]
    IndexOutOfRange { index: u64, total: u64 }, // 7002

    /// Leaf stored at the index is not the note's commitment
    #[error("leaf at index {index} does not match the note commitment")]
    CommitmentMismatch { index: u64 }, // 7003

    // ========== Consistency Errors (7010-7019) ==========
    /// Path fold or rebuilt root disagrees with the expected root
    #[error("root mismatch: expected {expected}, computed {computed}")]
    RootMismatch {
        expected: FieldElement,
        computed: FieldElement,
    }, // 7010

    /// Rebuilt tree holds a different number of leaves than the ledger
    #[error("leaf count mismatch: ledger reports {expected}, rebuilt {actual}")]
    LeafCountMismatch { expected: u64, actual: u64 }, // 7011

    /// Event feed skips an index
    #[error("event feed gap: expected index {expected}, found {found}")]
    EventGap { expected: u64, found: u64 }, // 7012

    /// Event feed repeats an index
    #[error("event feed repeats index {index}")]
    DuplicateEvent { index: u64 }, // 7013

    // ========== Tree Errors (7020-7029) ==========
    #[error("merkle tree is full")]
    TreeFull, // 7020

    #[error("tree depth must be between {min} and {max}, got {depth}")]
    InvalidTreeDepth { depth: u8, min: u8, max: u8 }, // 7021

    #[error("cannot roll back {requested} leaves, tree holds {total}")]
    RollbackUnderflow { requested: usize, total: u64 }, // 7022

    // ========== Batch / Deposit Errors (7030-7039) ==========
    /// A real commitment follows a padding slot
    #[error("invalid batch padding: non-zero commitment in slot {slot} follows a zero slot")]
    InvalidBatchPadding { slot: usize }, // 7030

    #[error("batch holds {len} commitments, maximum is {max}")]
    BatchTooLarge { len: usize, max: usize }, // 7031

    // 7032 retired

    #[error("commitment equals the zero leaf")]
    ZeroCommitment, // 7033

    #[error("fee {fee} exceeds note amount {amount}")]
    FeeExceedsAmount { fee: u128, amount: u128 }, // 7034

    // ========== Encoding Errors (7040-7049) ==========
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("invalid proof format: {0}")]
    InvalidProofFormat(String),

    #[error("hash error: {0}")]
    Hash(String),

    // ========== External Errors (7050-7059) ==========
    /// Proving capability failed or timed out. State was rolled back.
    #[error("proving failed for {circuit} circuit: {source}")]
    ProvingFailure {
        circuit: Circuit,
        #[source]
        source: ProverError,
    },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PoolError {
    /// Stable numeric code for this error.
    pub fn code(&self) -> u32 {
        match self {
            PoolError::IndexUnassigned => 7000,
            PoolError::IndexAlreadyAssigned { .. } => 7001,
            PoolError::IndexOutOfRange { .. } => 7002,
            PoolError::CommitmentMismatch { .. } => 7003,
            PoolError::RootMismatch { .. } => 7010,
            PoolError::LeafCountMismatch { .. } => 7011,
            PoolError::EventGap { .. } => 7012,
            PoolError::DuplicateEvent { .. } => 7013,
            PoolError::TreeFull => 7020,
            PoolError::InvalidTreeDepth { .. } => 7021,
            PoolError::RollbackUnderflow { .. } => 7022,
            PoolError::InvalidBatchPadding { .. } => 7030,
            PoolError::BatchTooLarge { .. } => 7031,
            PoolError::ZeroCommitment => 7033,
            PoolError::FeeExceedsAmount { .. } => 7034,
            PoolError::InvalidFieldElement(_) => 7040,
            PoolError::InvalidProofFormat(_) => 7041,
            PoolError::Hash(_) => 7042,
            PoolError::ProvingFailure { .. } => 7050,
            PoolError::Ledger(_) => 7051,
            PoolError::Config(_) => 7052,
            PoolError::Serialization(_) => 7053,
            PoolError::Io(_) => 7054,
        }
    }

    /// Internal-consistency failures. Never auto-corrected.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PoolError::RootMismatch { .. }
                | PoolError::LeafCountMismatch { .. }
                | PoolError::EventGap { .. }
                | PoolError::DuplicateEvent { .. }
                | PoolError::Hash(_)
        )
    }

    /// Only a failed prove call may be retried, and only after rollback.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::ProvingFailure { .. })
    }
}

impl From<light_poseidon::PoseidonError> for PoolError {
    fn from(e: light_poseidon::PoseidonError) -> Self {
        PoolError::Hash(e.to_string())
    }
}

impl From<toml::de::Error> for PoolError {
    fn from(e: toml::de::Error) -> Self {
        PoolError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_proving_failure_is_retryable() {
        let proving = PoolError::ProvingFailure {
            circuit: Circuit::Withdraw,
            source: "backend offline".into(),
        };
        assert!(proving.is_retryable());
        assert!(!proving.is_fatal());
        assert!(!PoolError::TreeFull.is_retryable());
        assert!(!PoolError::IndexUnassigned.is_retryable());
    }

    #[test]
    fn test_consistency_errors_are_fatal() {
        let mismatch = PoolError::RootMismatch {
            expected: FieldElement::from(1u64),
            computed: FieldElement::from(2u64),
        };
        assert!(mismatch.is_fatal());
        assert!(PoolError::DuplicateEvent { index: 3 }.is_fatal());
        assert!(!PoolError::InvalidBatchPadding { slot: 2 }.is_fatal());
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            PoolError::IndexUnassigned,
            PoolError::TreeFull,
            PoolError::BatchTooLarge { len: 9, max: 8 },
            PoolError::ZeroCommitment,
            PoolError::InvalidBatchPadding { slot: 1 },
            PoolError::IndexOutOfRange { index: 4, total: 2 },
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
