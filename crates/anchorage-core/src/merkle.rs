//! Merkle commitments and inclusion proofs
//!
//! Leaves are hashed individually, then pairs are combined as
//! `H(left || right)` level by level. A level with an odd number of nodes
//! duplicates its last node before pairing (Bitcoin convention); persisted
//! roots depend on this, so it must not change.
//!
//! Proofs list sibling hashes from the leaf level up to the root. Each step
//! also carries the side its sibling sits on, which is the parity of the
//! running index at that level.

use serde::{Deserialize, Serialize};

use crate::errors::{AnchorageError, Result};
use crate::hash::{hash_pair, Hash32};

/// Root reported for an empty leaf set
pub const EMPTY_ROOT: Hash32 = Hash32::ZERO;

/// Maximum number of proof steps accepted during verification
pub const MAX_MERKLE_DEPTH: usize = 64;

/// Which side of the running node the sibling occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Sibling is the left operand: `H(sibling || current)`
    Left,
    /// Sibling is the right operand: `H(current || sibling)`
    Right,
}

impl Side {
    fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// One level of an inclusion proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Side of the sibling relative to the running node
    pub side: Side,
    /// Sibling hash at this level
    pub sibling: Hash32,
}

/// Inclusion proof for one leaf, ordered leaf to root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the leaf in its tree
    pub leaf_index: usize,
    /// Sibling steps from the leaf level upward
    pub steps: Vec<ProofStep>,
}

impl InclusionProof {
    /// Rebuild a proof from the plain sibling list stored in manifests
    ///
    /// Sides are derived from the parity of `leaf_index` at each level.
    pub fn from_siblings(leaf_index: usize, siblings: &[Hash32]) -> Result<Self> {
        if !index_fits_depth(leaf_index, siblings.len()) {
            return Err(AnchorageError::index_out_of_range(
                leaf_index,
                1usize.checked_shl(siblings.len() as u32).unwrap_or(usize::MAX),
            ));
        }
        let mut index = leaf_index;
        let steps = siblings
            .iter()
            .map(|sibling| {
                let step = ProofStep {
                    side: Side::for_index(index),
                    sibling: *sibling,
                };
                index /= 2;
                step
            })
            .collect();
        Ok(Self { leaf_index, steps })
    }

    /// Sibling hashes without side flags, as written to manifests
    pub fn siblings(&self) -> Vec<Hash32> {
        self.steps.iter().map(|step| step.sibling).collect()
    }

    /// Number of levels in the proof
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the proof has no steps (single-leaf tree)
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fold the leaf through every step
    pub fn compute_root(&self, leaf: &[u8]) -> Hash32 {
        self.steps
            .iter()
            .fold(Hash32::digest(leaf), |current, step| match step.side {
                Side::Right => hash_pair(&current, &step.sibling),
                Side::Left => hash_pair(&step.sibling, &current),
            })
    }

    /// Check that `leaf` at `leaf_index` reproduces `root`
    ///
    /// Side flags must agree with the index parity; a proof whose flags were
    /// tampered with independently of its index is rejected.
    pub fn verify(&self, leaf: &[u8], root: &Hash32) -> bool {
        if self.steps.len() > MAX_MERKLE_DEPTH || !index_fits_depth(self.leaf_index, self.steps.len()) {
            return false;
        }
        let mut index = self.leaf_index;
        for step in &self.steps {
            if step.side != Side::for_index(index) {
                return false;
            }
            index /= 2;
        }
        &self.compute_root(leaf) == root
    }
}

/// A fully materialised tree; every level is kept so proofs are O(log n)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    // levels[0] holds the leaf hashes, the last level holds the root.
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in order
    pub fn build<L: AsRef<[u8]>>(leaves: &[L]) -> Self {
        let leaf_level: Vec<Hash32> = leaves
            .iter()
            .map(|leaf| Hash32::digest(leaf.as_ref()))
            .collect();
        if leaf_level.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaf_level];
        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Hash32> = current
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    // Odd level: the last node is paired with itself.
                    let right = pair.get(1).unwrap_or(left);
                    hash_pair(left, right)
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Commitment root, or [`EMPTY_ROOT`] for an empty tree
    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Number of proof steps for any leaf
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Inclusion proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> Result<InclusionProof> {
        let len = self.leaf_count();
        if index >= len {
            return Err(AnchorageError::index_out_of_range(index, len));
        }

        let mut steps = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.depth()] {
            // A missing right sibling means the node was duplicated.
            let sibling = level.get(position ^ 1).unwrap_or(&level[position]);
            steps.push(ProofStep {
                side: Side::for_index(position),
                sibling: *sibling,
            });
            position /= 2;
        }
        Ok(InclusionProof {
            leaf_index: index,
            steps,
        })
    }
}

/// Commitment root over `leaves`
pub fn merkle_root<L: AsRef<[u8]>>(leaves: &[L]) -> Hash32 {
    MerkleTree::build(leaves).root()
}

/// Inclusion proof for `leaves[index]`
pub fn merkle_proof<L: AsRef<[u8]>>(leaves: &[L], index: usize) -> Result<InclusionProof> {
    MerkleTree::build(leaves).proof(index)
}

/// Verify a plain sibling list against `expected_root`
///
/// Combines as `H(current || sibling)` while the running index is even and
/// `H(sibling || current)` while it is odd, halving the index per level.
pub fn verify_proof(leaf: &[u8], siblings: &[Hash32], index: usize, expected_root: &Hash32) -> bool {
    match InclusionProof::from_siblings(index, siblings) {
        Ok(proof) => proof.verify(leaf, expected_root),
        Err(_) => false,
    }
}

// An index needing more bits than the proof has levels would otherwise
// alias a smaller index and still verify.
fn index_fits_depth(index: usize, depth: usize) -> bool {
    u32::try_from(depth)
        .ok()
        .and_then(|shift| index.checked_shr(shift))
        .map_or(true, |rest| rest == 0)
}
