//! Pool state held off-chain

pub mod merkle_tree;
pub mod note;
pub mod pool_config;

pub use merkle_tree::{fold_path, verify_path, MerkleAccumulator, MAX_TREE_DEPTH, MIN_TREE_DEPTH};
pub use note::Note;
pub use pool_config::{CircuitArtifacts, CircuitFiles, PoolConfig, DEFAULT_TREE_DEPTH};
