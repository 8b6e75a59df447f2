//! Proving capability and the prove-with-rollback pipeline
//!
//! # Flow
//! 1. Build the witness (deposits insert into the tree here)
//! 2. Hand the witness JSON and circuit artifacts to the prover
//! 3. On prover error or timeout, undo this attempt's insertions and
//!    return `ProvingFailure`; the caller may retry from clean state
//!
//! The pipeline holds `&mut MerkleAccumulator` across the prove call, so
//! no other mutation can slip in between the insert and its rollback.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::crypto::field::FieldElement;
use crate::crypto::groth16::ProofOutput;
use crate::crypto::poseidon::PoolHasher;
use crate::error::{PoolError, Result};
use crate::state::merkle_tree::MerkleAccumulator;
use crate::state::note::Note;
use crate::state::pool_config::{CircuitArtifacts, CircuitFiles, PoolConfig};
use crate::witness::{
    abort, build_deposit, build_multi_deposit, build_withdraw, CircuitWitness, DepositWitness,
    MultiDepositWitness, WithdrawWitness,
};

/// Error type reported by a proving backend.
pub type ProverError = Box<dyn std::error::Error + Send + Sync>;

/// The three pool circuits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Circuit {
    SingleDeposit,
    MultiDeposit,
    Withdraw,
}

impl Circuit {
    /// Artifact base name.
    pub const fn name(self) -> &'static str {
        match self {
            Circuit::SingleDeposit => "SingleDeposit",
            Circuit::MultiDeposit => "MultiDeposit",
            Circuit::Withdraw => "Withdraw",
        }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// External Groth16 prover (snarkjs, rapidsnark, a remote service...).
///
/// May be slow and may fail. Cancelling an in-flight proof is the
/// implementation's business.
pub trait Prover {
    fn prove(
        &self,
        circuit: Circuit,
        files: &CircuitFiles,
        input: &serde_json::Value,
    ) -> impl Future<Output = std::result::Result<ProofOutput, ProverError>> + Send;
}

/// A witness together with the proof generated from it.
#[derive(Clone, Debug)]
pub struct Proved<W> {
    pub witness: W,
    pub output: ProofOutput,
}

impl<W> Proved<W> {
    pub fn public_signals(&self) -> &[FieldElement] {
        &self.output.public_signals
    }
}

/// Builds witnesses and drives the prover against one pool's artifacts.
#[derive(Clone, Debug)]
pub struct ProvingPipeline<P> {
    prover: P,
    artifacts: CircuitArtifacts,
    timeout: Option<Duration>,
}

impl<P: Prover> ProvingPipeline<P> {
    pub fn new(prover: P, config: &PoolConfig) -> Self {
        Self {
            prover,
            artifacts: config.artifacts.clone(),
            timeout: config.prove_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prover(&self) -> &P {
        &self.prover
    }

    /// Deposit `commitment` and prove it.
    pub async fn prove_deposit<H: PoolHasher>(
        &self,
        tree: &mut MerkleAccumulator<H>,
        commitment: FieldElement,
    ) -> Result<Proved<DepositWitness>> {
        let witness = build_deposit(tree, commitment)?;
        self.prove_inserted(tree, witness).await
    }

    /// Deposit a batch of up to eight commitments and prove it.
    pub async fn prove_multi_deposit<H: PoolHasher>(
        &self,
        tree: &mut MerkleAccumulator<H>,
        commitments: &[FieldElement],
    ) -> Result<Proved<MultiDepositWitness>> {
        let witness = build_multi_deposit(tree, commitments)?;
        self.prove_inserted(tree, witness).await
    }

    /// Prove a withdraw of `note`. The tree is only read.
    pub async fn prove_withdraw<H: PoolHasher>(
        &self,
        tree: &MerkleAccumulator<H>,
        note: &Note,
        receiver: &str,
        fee: u128,
    ) -> Result<Proved<WithdrawWitness>> {
        let witness = build_withdraw(tree, note, receiver, fee)?;
        let circuit = witness.circuit();
        match self.run(&witness).await? {
            Ok(output) => Ok(Proved { witness, output }),
            Err(source) => {
                warn!(%circuit, %source, "proving failed");
                Err(PoolError::ProvingFailure { circuit, source })
            }
        }
    }

    /// Prove a witness whose insertions are already in `tree`, rolling
    /// them back if the prover fails.
    async fn prove_inserted<H: PoolHasher, W: CircuitWitness>(
        &self,
        tree: &mut MerkleAccumulator<H>,
        witness: W,
    ) -> Result<Proved<W>> {
        let outcome = match self.run(&witness).await {
            Ok(outcome) => outcome,
            Err(e) => return abort(tree, witness.inserted(), e),
        };

        match outcome {
            Ok(output) => Ok(Proved { witness, output }),
            Err(source) => {
                let circuit = witness.circuit();
                let inserted = witness.inserted();
                warn!(%circuit, %source, inserted, "proving failed, rolling back");
                if let Err(undo) = tree.rollback(inserted) {
                    error!(%circuit, %undo, "rollback after failed proof did not apply");
                    return Err(undo);
                }
                Err(PoolError::ProvingFailure { circuit, source })
            }
        }
    }

    /// Outer error: the witness could not be encoded. Inner error: the
    /// prover failed or timed out.
    async fn run<W: CircuitWitness>(
        &self,
        witness: &W,
    ) -> Result<std::result::Result<ProofOutput, ProverError>> {
        let circuit = witness.circuit();
        let input = witness.to_input()?;
        let files = self.artifacts.files(circuit);
        info!(%circuit, wasm = %files.wasm.display(), "requesting proof");

        let proving = self.prover.prove(circuit, &files, &input);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, proving).await {
                Ok(outcome) => outcome,
                Err(elapsed) => Err(Box::new(elapsed) as ProverError),
            },
            None => proving.await,
        };
        Ok(outcome)
    }
}
