//! Accumulator reconstruction from the ledger's event log
//!
//! Replays every accepted leaf, padding included, and checks the result
//! against what the ledger reports. A disagreement is a desync and is
//! never papered over.

use std::future::Future;

use tracing::{debug, error, info, warn};

use crate::crypto::field::FieldElement;
use crate::crypto::pedersen::CircomPedersen;
use crate::crypto::poseidon::{PoolHasher, ZERO_LEAF};
use crate::error::{PoolError, Result};
use crate::events::DepositEvent;
use crate::state::merkle_tree::MerkleAccumulator;
use crate::state::pool_config::PoolConfig;

/// Count/root reads attempted before `sync` gives up on a busy ledger.
pub const SNAPSHOT_ATTEMPTS: usize = 2;

/// Read-only view of the pool contract.
pub trait PoolLedger {
    /// Every deposit event emitted so far, in any order.
    fn deposit_events(&self) -> impl Future<Output = Result<Vec<DepositEvent>>> + Send;

    /// Leaves the contract has accepted.
    fn leaf_count(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The contract's current root.
    fn last_root(&self) -> impl Future<Output = Result<FieldElement>> + Send;
}

/// Rebuilds accumulators with a fixed hasher and tree shape.
#[derive(Clone, Debug)]
pub struct AccumulatorRebuilder<H = CircomPedersen> {
    hasher: H,
    depth: u8,
    zero_leaf: FieldElement,
}

impl AccumulatorRebuilder<CircomPedersen> {
    pub fn new(depth: u8) -> Self {
        Self::with_hasher(CircomPedersen, depth, ZERO_LEAF)
    }
}

impl<H: PoolHasher + Clone> AccumulatorRebuilder<H> {
    pub fn with_hasher(hasher: H, depth: u8, zero_leaf: FieldElement) -> Self {
        Self {
            hasher,
            depth,
            zero_leaf,
        }
    }

    pub fn from_config(config: &PoolConfig, hasher: H) -> Self {
        Self::with_hasher(hasher, config.depth, config.zero_leaf)
    }

    /// Replay `events` into a fresh tree.
    ///
    /// Events may arrive in any order; after sorting their indices must be
    /// exactly `0..n`. Every commitment is force-inserted so padding slots
    /// land where they did on-chain.
    pub fn rebuild(
        &self,
        events: impl IntoIterator<Item = DepositEvent>,
    ) -> Result<MerkleAccumulator<H>> {
        let mut events: Vec<DepositEvent> = events.into_iter().collect();
        events.sort_by_key(|e| e.index);

        let mut tree = MerkleAccumulator::with_hasher(self.hasher.clone(), self.depth, self.zero_leaf)?;
        for (expected, event) in (0u64..).zip(&events) {
            if event.index < expected {
                error!(index = event.index, "duplicate deposit event");
                return Err(PoolError::DuplicateEvent { index: event.index });
            }
            if event.index > expected {
                error!(expected, found = event.index, "gap in deposit events");
                return Err(PoolError::EventGap {
                    expected,
                    found: event.index,
                });
            }
            tree.insert(event.commitment, true)?;
        }

        debug!(leaves = tree.total_elements(), root = %tree.root(), "tree rebuilt");
        Ok(tree)
    }

    /// Rebuild and require the ledger's leaf count and root.
    pub fn rebuild_verified(
        &self,
        events: impl IntoIterator<Item = DepositEvent>,
        expected_root: FieldElement,
        expected_count: u64,
    ) -> Result<MerkleAccumulator<H>> {
        let tree = self.rebuild(events)?;

        if tree.total_elements() != expected_count {
            error!(
                expected = expected_count,
                actual = tree.total_elements(),
                "rebuilt leaf count disagrees with ledger"
            );
            return Err(PoolError::LeafCountMismatch {
                expected: expected_count,
                actual: tree.total_elements(),
            });
        }
        if tree.root() != expected_root {
            error!(expected = %expected_root, computed = %tree.root(), "rebuilt root disagrees with ledger");
            return Err(PoolError::RootMismatch {
                expected: expected_root,
                computed: tree.root(),
            });
        }

        Ok(tree)
    }

    /// Fetch the ledger's state and rebuild against it.
    ///
    /// Count and root are read first, as one snapshot (see
    /// [`ledger_snapshot`]); events past that count (deposits that landed
    /// while syncing) are left for the next sync.
    pub async fn sync<L: PoolLedger>(&self, ledger: &L) -> Result<MerkleAccumulator<H>> {
        let (count, root) = ledger_snapshot(ledger).await?;
        let events = ledger.deposit_events().await?;

        let fetched = events.len();
        let events = events.into_iter().filter(|e| e.index < count);
        let tree = self.rebuild_verified(events, root, count)?;

        info!(leaves = count, fetched, root = %root, "synced tree from ledger");
        Ok(tree)
    }
}

/// Leaf count and the root for exactly that count.
///
/// The count is read again after the root. If a deposit landed in
/// between, the pair is retaken, up to [`SNAPSHOT_ATTEMPTS`] times.
pub async fn ledger_snapshot<L: PoolLedger>(ledger: &L) -> Result<(u64, FieldElement)> {
    for attempt in 1..=SNAPSHOT_ATTEMPTS {
        let count = ledger.leaf_count().await?;
        let root = ledger.last_root().await?;
        let settled = ledger.leaf_count().await?;
        if settled == count {
            return Ok((count, root));
        }
        warn!(attempt, before = count, after = settled, "ledger advanced while reading root");
    }

    Err(PoolError::Ledger(format!(
        "leaf count kept moving across {SNAPSHOT_ATTEMPTS} snapshot attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(values: &[u64]) -> Vec<DepositEvent> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DepositEvent::new(i as u64, FieldElement::from(*v)))
            .collect()
    }

    #[test]
    fn test_rebuild_empty() {
        let tree = AccumulatorRebuilder::new(4).rebuild(Vec::<DepositEvent>::new()).unwrap();
        assert_eq!(tree.root(), MerkleAccumulator::new(4).unwrap().root());
    }

    #[test]
    fn test_rebuild_keeps_padding_slots() {
        let mut log = events(&[1, 2]);
        log.push(DepositEvent::new(2, ZERO_LEAF));
        log.push(DepositEvent::new(3, FieldElement::from(4u64)));

        let tree = AccumulatorRebuilder::new(3).rebuild(log).unwrap();
        assert_eq!(tree.total_elements(), 4);
        assert_eq!(tree.leaf(2), Some(ZERO_LEAF));
        assert_eq!(tree.leaf(3), Some(FieldElement::from(4u64)));
    }

    #[test]
    fn test_rebuild_rejects_gap() {
        let mut log = events(&[1, 2, 3]);
        log.remove(1);
        assert!(matches!(
            AccumulatorRebuilder::new(3).rebuild(log),
            Err(PoolError::EventGap { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn test_rebuild_rejects_duplicate() {
        let mut log = events(&[1, 2]);
        log.push(DepositEvent::new(1, FieldElement::from(9u64)));
        assert!(matches!(
            AccumulatorRebuilder::new(3).rebuild(log),
            Err(PoolError::DuplicateEvent { index: 1 })
        ));
    }

    #[test]
    fn test_rebuild_verified_mismatches() {
        let rebuilder = AccumulatorRebuilder::new(3);
        let root = rebuilder.rebuild(events(&[1, 2])).unwrap().root();

        assert!(rebuilder.rebuild_verified(events(&[1, 2]), root, 2).is_ok());
        assert!(matches!(
            rebuilder.rebuild_verified(events(&[1, 2]), root, 3),
            Err(PoolError::LeafCountMismatch { expected: 3, actual: 2 })
        ));
        let err = rebuilder
            .rebuild_verified(events(&[1, 2]), FieldElement::from(5u64), 2)
            .unwrap_err();
        assert!(matches!(err, PoolError::RootMismatch { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_rebuild_overflowing_log() {
        assert!(matches!(
            AccumulatorRebuilder::new(1).rebuild(events(&[1, 2, 3])),
            Err(PoolError::TreeFull)
        ));
    }
}
