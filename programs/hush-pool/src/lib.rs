//! Hush Pool - shielded pool accounting core
//!
//! Tracks the pool contract's commitment tree off-chain, models the notes
//! depositors hold, and turns both into inputs for the deposit,
//! multi-deposit and withdraw circuits.
//!
//! # Components
//! - `crypto`: BN254 field elements, Poseidon and Pedersen, Groth16 proofs
//! - `state`: the Merkle accumulator, notes, pool configuration
//! - `witness`: circuit inputs paired with the matching tree mutation
//! - `prover`: the external proving capability and rollback on failure
//! - `rebuild`: reconstruction from the ledger's deposit events
//!
//! The accumulator has a single writer. Indices are positional and must
//! follow the ledger's acceptance order.

pub mod crypto;
pub mod error;
pub mod events;
pub mod prover;
pub mod rebuild;
pub mod state;
pub mod witness;


pub use crypto::{
    CircomPedersen, CircomPoseidon, FieldElement, Groth16Proof, PoolHasher, ProofOutput, ZERO_LEAF,
};
pub use error::{PoolError, Result};
pub use events::DepositEvent;
pub use prover::{Circuit, Proved, Prover, ProverError, ProvingPipeline};
pub use rebuild::{AccumulatorRebuilder, PoolLedger};
pub use state::{MerkleAccumulator, Note, PoolConfig};
pub use witness::{
    build_deposit, build_multi_deposit, build_withdraw, CircuitWitness, DepositWitness,
    MultiDepositWitness, WithdrawWitness, BATCH_SIZE,
};
