//! Incremental Merkle tree for commitment storage
//!
//! Append-only, fixed-depth tree mirroring the pool contract's accumulator.
//! Every level keeps the nodes written so far; any position past the end of
//! a level reads as that level's empty-subtree hash.
//!
//! ```text
//! layers[depth]   = [root]
//! layers[i]       = written nodes at level i, positions 0..len
//! node(i, p)      = layers[i][p] if written, else zeros[i]
//! ```
//!
//! Single writer only: leaf indices must follow the ledger's acceptance
//! order, so callers serialize `insert`/`rollback` behind `&mut`.

use tracing::{debug, error, warn};

use crate::crypto::field::{short, FieldElement};
use crate::crypto::pedersen::CircomPedersen;
use crate::crypto::poseidon::{compute_zero_values, PoolHasher, ZERO_LEAF};
use crate::error::{PoolError, Result};
use crate::state::pool_config::PoolConfig;

/// Maximum supported tree depth (2^32 leaves)
pub const MAX_TREE_DEPTH: u8 = 32;

/// Minimum supported tree depth
pub const MIN_TREE_DEPTH: u8 = 1;

/// Incremental Merkle accumulator.
#[derive(Clone, Debug)]
pub struct MerkleAccumulator<H = CircomPedersen> {
    hasher: H,

    /// Tree depth (immutable after construction)
    depth: u8,

    /// Canonical empty leaf
    zero_leaf: FieldElement,

    /// zeros[0] = zero leaf, zeros[i] = hash(zeros[i-1], zeros[i-1])
    /// Length = depth + 1
    zeros: Vec<FieldElement>,

    /// Written nodes per level. Length = depth + 1, top level holds the root.
    layers: Vec<Vec<FieldElement>>,

    /// Leaves inserted so far (also the next leaf index)
    total_elements: u64,
}

impl MerkleAccumulator<CircomPedersen> {
    /// Empty tree with the default hash and zero leaf.
    pub fn new(depth: u8) -> Result<Self> {
        Self::with_hasher(CircomPedersen, depth, ZERO_LEAF)
    }
}

impl<H: PoolHasher> MerkleAccumulator<H> {
    /// Empty tree with an injected hash construction.
    pub fn with_hasher(hasher: H, depth: u8, zero_leaf: FieldElement) -> Result<Self> {
        if !(MIN_TREE_DEPTH..=MAX_TREE_DEPTH).contains(&depth) {
            return Err(PoolError::InvalidTreeDepth {
                depth,
                min: MIN_TREE_DEPTH,
                max: MAX_TREE_DEPTH,
            });
        }

        let mut tree = Self {
            hasher,
            depth,
            zero_leaf,
            zeros: Vec::new(),
            layers: Vec::new(),
            total_elements: 0,
        };
        tree.init()?;
        Ok(tree)
    }

    /// Empty tree sized by the pool configuration.
    pub fn from_config(config: &PoolConfig, hasher: H) -> Result<Self> {
        Self::with_hasher(hasher, config.depth, config.zero_leaf)
    }

    /// Reset to the canonical empty tree (the contract's genesis root).
    pub fn init(&mut self) -> Result<()> {
        self.zeros = compute_zero_values(&self.hasher, self.zero_leaf, self.depth)?;
        self.layers = vec![Vec::new(); self.depth as usize + 1];
        self.layers[self.depth as usize].push(self.zeros[self.depth as usize]);
        self.total_elements = 0;
        Ok(())
    }

    /// Insert a leaf and return its index.
    ///
    /// The zero leaf is batch padding: unless `force_insert` is set it is a
    /// no-op returning the current element count.
    pub fn insert(&mut self, leaf: FieldElement, force_insert: bool) -> Result<u64> {
        if leaf == self.zero_leaf && !force_insert {
            return Ok(self.total_elements);
        }

        if self.is_full() {
            warn!(depth = self.depth, "insert rejected: tree is full");
            return Err(PoolError::TreeFull);
        }

        let index = self.total_elements;
        let updates = self.climb(index, leaf, index + 1)?;

        let mut position = index as usize;
        for (level, value) in updates.into_iter().enumerate() {
            let layer = &mut self.layers[level];
            if position < layer.len() {
                layer[position] = value;
            } else {
                layer.push(value);
            }
            position >>= 1;
        }
        self.total_elements += 1;

        debug!(index, leaf = %short(&leaf), root = %short(&self.root()), "leaf inserted");
        Ok(index)
    }

    /// Node values from `leaf` at `index` up to the root, for the tree
    /// holding exactly `total` leaves.
    fn climb(&self, index: u64, leaf: FieldElement, total: u64) -> Result<Vec<FieldElement>> {
        let mut values = Vec::with_capacity(self.depth as usize + 1);
        let mut current = leaf;
        let mut position = index as usize;

        for level in 0..self.depth as usize {
            values.push(current);
            let sibling = self.node_within(level, position ^ 1, total);
            current = if position & 1 == 0 {
                // Left child: right sibling is unwritten or empty
                self.hasher.hash_two_to_one(&current, &sibling)?
            } else {
                // Right child: left sibling already written
                self.hasher.hash_two_to_one(&sibling, &current)?
            };
            position >>= 1;
        }
        values.push(current);

        Ok(values)
    }

    /// Undo the last `count` insertions.
    ///
    /// Direct inverse of [`insert`](Self::insert): every level is cut back
    /// to the new leaf count and only the new rightmost path is rehashed.
    /// All hashing happens before the first write, so on error the tree is
    /// unchanged.
    pub fn rollback(&mut self, count: usize) -> Result<()> {
        let total = self.total_elements;
        if count as u64 > total {
            warn!(count, total, "rollback rejected");
            return Err(PoolError::RollbackUnderflow {
                requested: count,
                total,
            });
        }
        if count == 0 {
            return Ok(());
        }

        let new_total = total - count as u64;
        let depth = self.depth as usize;
        let updates = match new_total.checked_sub(1) {
            Some(last) => {
                let leaf = self.layers[0][last as usize];
                Some((last, self.climb(last, leaf, new_total)?))
            }
            None => None,
        };

        for level in 0..depth {
            let len = level_len(new_total, level) as usize;
            self.layers[level].truncate(len);
        }
        match updates {
            Some((last, values)) => {
                let mut position = last as usize;
                for (level, value) in values.into_iter().enumerate() {
                    self.layers[level][position] = value;
                    position >>= 1;
                }
            }
            None => self.layers[depth][0] = self.zeros[depth],
        }
        self.total_elements = new_total;

        debug!(count, total = new_total, root = %short(&self.root()), "rolled back");
        Ok(())
    }

    /// Sibling path for a written leaf, leaf to root.
    ///
    /// The path is folded back to the stored root before it is returned; a
    /// mismatch means the tree is corrupt.
    pub fn path(&self, index: u64) -> Result<Vec<FieldElement>> {
        if index >= self.total_elements {
            return Err(PoolError::IndexOutOfRange {
                index,
                total: self.total_elements,
            });
        }
        let leaf = self.layers[0][index as usize];
        self.checked_path(leaf, index)
    }

    /// Path for the unwritten slot a batch padding leaf would occupy.
    pub(crate) fn padding_path(&self, index: u64) -> Result<Vec<FieldElement>> {
        if index < self.total_elements || index >= self.capacity() {
            return Err(PoolError::IndexOutOfRange {
                index,
                total: self.total_elements,
            });
        }
        self.checked_path(self.zero_leaf, index)
    }

    fn checked_path(&self, leaf: FieldElement, index: u64) -> Result<Vec<FieldElement>> {
        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut position = index as usize;
        for level in 0..self.depth as usize {
            siblings.push(self.node(level, position ^ 1));
            position >>= 1;
        }

        let computed = fold_path(&self.hasher, leaf, index, &siblings)?;
        if computed != self.root() {
            error!(index, root = %self.root(), %computed, "merkle path does not fold to root");
            return Err(PoolError::RootMismatch {
                expected: self.root(),
                computed,
            });
        }

        Ok(siblings)
    }

    /// Node value at `level`/`position`, falling back to the empty hash.
    fn node(&self, level: usize, position: usize) -> FieldElement {
        self.layers[level]
            .get(position)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Like [`node`](Self::node), but ignores anything written by leaves
    /// at or past `total`.
    fn node_within(&self, level: usize, position: usize, total: u64) -> FieldElement {
        if (position as u64) < level_len(total, level) {
            self.node(level, position)
        } else {
            self.zeros[level]
        }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Get the current Merkle root.
    pub fn root(&self) -> FieldElement {
        self.layers[self.depth as usize][0]
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Leaves inserted so far (also the next leaf index).
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// Index of the newest leaf.
    pub fn last_index(&self) -> Option<u64> {
        self.total_elements.checked_sub(1)
    }

    /// Get tree capacity.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Check if tree is full.
    pub fn is_full(&self) -> bool {
        self.total_elements >= self.capacity()
    }

    pub fn zero_leaf(&self) -> FieldElement {
        self.zero_leaf
    }

    /// Empty-subtree hash per level, leaf level first.
    pub fn zero_values(&self) -> &[FieldElement] {
        &self.zeros
    }

    /// Written leaf at `index`.
    pub fn leaf(&self, index: u64) -> Option<FieldElement> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.layers[0].get(i).copied())
    }
}

/// Nodes written at `level` once `total` leaves are in.
fn level_len(total: u64, level: usize) -> u64 {
    match total.checked_sub(1) {
        Some(last) => (last >> level) + 1,
        None => 0,
    }
}

/// Root implied by `leaf` at `index` with the given sibling path.
///
/// Levels past the width of `index` read its bit as zero.
pub fn fold_path<H: PoolHasher>(
    hasher: &H,
    leaf: FieldElement,
    index: u64,
    siblings: &[FieldElement],
) -> Result<FieldElement> {
    let mut current = leaf;
    for (level, sibling) in siblings.iter().enumerate() {
        let bit = u32::try_from(level)
            .ok()
            .and_then(|shift| index.checked_shr(shift))
            .unwrap_or(0)
            & 1;
        current = if bit == 0 {
            hasher.hash_two_to_one(&current, sibling)?
        } else {
            hasher.hash_two_to_one(sibling, &current)?
        };
    }
    Ok(current)
}

/// Check a path folds to `root`.
pub fn verify_path<H: PoolHasher>(
    hasher: &H,
    leaf: FieldElement,
    index: u64,
    siblings: &[FieldElement],
    root: FieldElement,
) -> Result<bool> {
    Ok(fold_path(hasher, leaf, index, siblings)? == root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::CircomPoseidon;

    fn leaves(n: u64) -> Vec<FieldElement> {
        (1..=n).map(|i| FieldElement::from(1000 + i)).collect()
    }

    #[test]
    fn test_depth_bounds() {
        assert!(matches!(
            MerkleAccumulator::new(0),
            Err(PoolError::InvalidTreeDepth { depth: 0, .. })
        ));
        assert!(MerkleAccumulator::new(33).is_err());
        assert!(MerkleAccumulator::new(1).is_ok());
        assert!(MerkleAccumulator::new(32).is_ok());
    }

    #[test]
    fn test_empty_root_is_top_zero() {
        let tree = MerkleAccumulator::new(5).unwrap();
        assert_eq!(tree.root(), tree.zero_values()[5]);
        assert_eq!(tree.total_elements(), 0);
        assert_eq!(tree.last_index(), None);
        assert_eq!(tree.capacity(), 32);
    }

    #[test]
    fn test_insert_matches_full_recompute() {
        let hasher = CircomPoseidon;
        let mut tree = MerkleAccumulator::new(3).unwrap();
        let values = leaves(5);
        for leaf in &values {
            tree.insert(*leaf, false).unwrap();
        }

        // Recompute the root level by level from padded leaves
        let mut level: Vec<FieldElement> = values.clone();
        level.resize(8, ZERO_LEAF);
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| hasher.hash_two_to_one(&pair[0], &pair[1]).unwrap())
                .collect();
        }
        assert_eq!(tree.root(), level[0]);
    }

    #[test]
    fn test_paths_fold_to_root() {
        let mut tree = MerkleAccumulator::new(4).unwrap();
        let values = leaves(7);
        for leaf in &values {
            tree.insert(*leaf, false).unwrap();
        }
        for (i, leaf) in values.iter().enumerate() {
            let path = tree.path(i as u64).unwrap();
            assert_eq!(path.len(), 4);
            assert!(verify_path(&CircomPoseidon, *leaf, i as u64, &path, tree.root()).unwrap());
        }
    }

    #[test]
    fn test_zero_leaf_is_noop_unless_forced() {
        let mut tree = MerkleAccumulator::new(3).unwrap();
        tree.insert(FieldElement::from(7u64), false).unwrap();
        let root = tree.root();

        assert_eq!(tree.insert(ZERO_LEAF, false).unwrap(), 1);
        assert_eq!(tree.total_elements(), 1);
        assert_eq!(tree.root(), root);

        assert_eq!(tree.insert(ZERO_LEAF, true).unwrap(), 1);
        assert_eq!(tree.total_elements(), 2);
        // A forced zero leaf writes the value the slot already implied
        assert_eq!(tree.root(), root);
        assert_eq!(tree.leaf(1), Some(ZERO_LEAF));
    }

    #[test]
    fn test_tree_full() {
        let mut tree = MerkleAccumulator::new(2).unwrap();
        for leaf in leaves(4) {
            tree.insert(leaf, false).unwrap();
        }
        assert!(tree.is_full());
        let root = tree.root();
        assert!(matches!(
            tree.insert(FieldElement::from(9u64), false),
            Err(PoolError::TreeFull)
        ));
        assert_eq!(tree.root(), root);
        assert_eq!(tree.total_elements(), 4);
    }

    #[test]
    fn test_path_out_of_range() {
        let mut tree = MerkleAccumulator::new(3).unwrap();
        tree.insert(FieldElement::from(1u64), false).unwrap();
        assert!(matches!(
            tree.path(1),
            Err(PoolError::IndexOutOfRange { index: 1, total: 1 })
        ));
    }

    #[test]
    fn test_padding_path_folds_zero_leaf() {
        let mut tree = MerkleAccumulator::new(3).unwrap();
        tree.insert(FieldElement::from(1u64), false).unwrap();
        let path = tree.padding_path(5).unwrap();
        assert!(verify_path(&CircomPoseidon, ZERO_LEAF, 5, &path, tree.root()).unwrap());
        assert!(tree.padding_path(0).is_err());
        assert!(tree.padding_path(8).is_err());
    }

    #[test]
    fn test_rollback_restores_previous_state() {
        let mut tree = MerkleAccumulator::new(4).unwrap();
        let mut roots = vec![tree.root()];
        for leaf in leaves(6) {
            tree.insert(leaf, false).unwrap();
            roots.push(tree.root());
        }

        tree.rollback(1).unwrap();
        assert_eq!(tree.total_elements(), 5);
        assert_eq!(tree.root(), roots[5]);

        tree.rollback(3).unwrap();
        assert_eq!(tree.total_elements(), 2);
        assert_eq!(tree.root(), roots[2]);

        tree.rollback(2).unwrap();
        assert_eq!(tree.root(), roots[0]);
        assert_eq!(tree.leaf(0), None);
    }

    #[test]
    fn test_rollback_then_reinsert_matches_fresh_tree() {
        let values = leaves(5);
        let mut tree = MerkleAccumulator::new(3).unwrap();
        for leaf in &values {
            tree.insert(*leaf, false).unwrap();
        }
        tree.rollback(2).unwrap();
        tree.insert(FieldElement::from(77u64), false).unwrap();

        let mut fresh = MerkleAccumulator::new(3).unwrap();
        for leaf in &values[..3] {
            fresh.insert(*leaf, false).unwrap();
        }
        fresh.insert(FieldElement::from(77u64), false).unwrap();

        assert_eq!(tree.root(), fresh.root());
        assert_eq!(tree.path(3).unwrap(), fresh.path(3).unwrap());
    }

    #[test]
    fn test_rollback_underflow_leaves_tree_untouched() {
        let mut tree = MerkleAccumulator::new(3).unwrap();
        tree.insert(FieldElement::from(1u64), false).unwrap();
        let root = tree.root();
        assert!(matches!(
            tree.rollback(2),
            Err(PoolError::RollbackUnderflow { requested: 2, total: 1 })
        ));
        assert_eq!(tree.root(), root);
        assert_eq!(tree.total_elements(), 1);
    }

    #[test]
    fn test_fold_path_longer_than_index_width() {
        let hasher = CircomPoseidon;
        let leaf = FieldElement::from(1u64);
        let siblings: Vec<FieldElement> = (0..70u64).map(FieldElement::from).collect();

        let folded = fold_path(&hasher, leaf, u64::MAX, &siblings).unwrap();

        // Above bit 63 the node is always the left child
        let mut expected = fold_path(&hasher, leaf, u64::MAX, &siblings[..64]).unwrap();
        for sibling in &siblings[64..] {
            expected = hasher.hash_two_to_one(&expected, sibling).unwrap();
        }
        assert_eq!(folded, expected);
        assert!(!verify_path(&hasher, leaf, u64::MAX, &siblings, FieldElement::zero()).unwrap());
    }

    #[test]
    fn test_init_resets() {
        let mut tree = MerkleAccumulator::new(3).unwrap();
        let empty = tree.root();
        tree.insert(FieldElement::from(1u64), false).unwrap();
        tree.init().unwrap();
        assert_eq!(tree.root(), empty);
        assert_eq!(tree.total_elements(), 0);
    }
}
