//! Pool configuration
//!
//! Loaded from TOML. Everything has a default, so an empty file describes
//! the stock depth-20 pool with artifacts under `zkproofs/build`:
//! ```toml
//! depth = 20
//! token_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! prove_timeout_secs = 120
//!
//! [artifacts]
//! build_dir = "zkproofs/build"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::field::FieldElement;
use crate::crypto::poseidon::ZERO_LEAF;
use crate::error::{PoolError, Result};
use crate::prover::Circuit;
use crate::state::merkle_tree::{MAX_TREE_DEPTH, MIN_TREE_DEPTH};

/// Depth of the deployed pools
pub const DEFAULT_TREE_DEPTH: u8 = 20;

/// Main pool configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Merkle tree depth (must match the circuits)
    pub depth: u8,

    /// Empty leaf value
    pub zero_leaf: FieldElement,

    /// Token the pool holds
    pub token_address: Option<String>,

    /// Upper bound on one prove call
    pub prove_timeout_secs: Option<u64>,

    /// Circuit artifact locations
    pub artifacts: CircuitArtifacts,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            zero_leaf: ZERO_LEAF,
            token_address: None,
            prove_timeout_secs: None,
            artifacts: CircuitArtifacts::default(),
        }
    }
}

impl PoolConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: PoolConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), depth = config.depth, "loaded pool config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&self.depth) {
            return Err(PoolError::InvalidTreeDepth {
                depth: self.depth,
                min: MIN_TREE_DEPTH,
                max: MAX_TREE_DEPTH,
            });
        }
        if self.prove_timeout_secs == Some(0) {
            return Err(PoolError::Config("prove_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn prove_timeout(&self) -> Option<Duration> {
        self.prove_timeout_secs.map(Duration::from_secs)
    }
}

/// Where compiled circuits live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitArtifacts {
    pub build_dir: PathBuf,
}

impl Default for CircuitArtifacts {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("zkproofs/build"),
        }
    }
}

/// Files for one circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitFiles {
    pub wasm: PathBuf,
    pub zkey: PathBuf,
    pub vkey: PathBuf,
}

impl CircuitArtifacts {
    pub fn files(&self, circuit: Circuit) -> CircuitFiles {
        let name = circuit.name();
        CircuitFiles {
            wasm: self.build_dir.join("wasm").join(format!("{name}.wasm")),
            zkey: self.build_dir.join("zKeys").join(format!("{name}_final.zkey")),
            vkey: self
                .build_dir
                .join("vKeys")
                .join(format!("{name}Verification_key.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = PoolConfig::from_toml_str("").unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.depth, 20);
        assert_eq!(config.zero_leaf, ZERO_LEAF);
        assert_eq!(config.prove_timeout(), None);
    }

    #[test]
    fn test_full_toml() {
        let config = PoolConfig::from_toml_str(
            r#"
            depth = 5
            zero_leaf = "0x01"
            token_address = "0xabc"
            prove_timeout_secs = 30

            [artifacts]
            build_dir = "/opt/hush/build"
            "#,
        )
        .unwrap();
        assert_eq!(config.depth, 5);
        assert_eq!(config.zero_leaf, FieldElement::from(1u64));
        assert_eq!(config.token_address.as_deref(), Some("0xabc"));
        assert_eq!(config.prove_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.artifacts.build_dir, PathBuf::from("/opt/hush/build"));
    }

    #[test]
    fn test_invalid_depth_rejected() {
        assert!(matches!(
            PoolConfig::from_toml_str("depth = 0"),
            Err(PoolError::InvalidTreeDepth { depth: 0, .. })
        ));
        assert!(PoolConfig::from_toml_str("depth = 40").is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            PoolConfig::from_toml_str("dpeth = 3"),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(PoolConfig::from_toml_str("prove_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_artifact_layout() {
        let files = CircuitArtifacts::default().files(Circuit::MultiDeposit);
        assert_eq!(files.wasm, PathBuf::from("zkproofs/build/wasm/MultiDeposit.wasm"));
        assert_eq!(files.zkey, PathBuf::from("zkproofs/build/zKeys/MultiDeposit_final.zkey"));
        assert_eq!(
            files.vkey,
            PathBuf::from("zkproofs/build/vKeys/MultiDepositVerification_key.json")
        );
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("hush-pool-config-{}.toml", std::process::id()));
        std::fs::write(&path, "depth = 7\n").unwrap();
        let config = PoolConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.depth, 7);
    }
}
