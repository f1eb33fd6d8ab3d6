//! Hash & Merkle layer.
//!
//! One SHA-256 hasher context per encoded column (`n` of them), built up
//! incrementally as rows stream through the encoder, then folded into a
//! binary Merkle tree over the `n` column digests. Decommitment produces the
//! minimal sibling set needed to recompute the root from a set of opened
//! columns, grounded directly on `zkp/merkle_tree.hpp`'s `builder`/
//! `decommitment`/`decommit`/`recommit` shapes.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const DIGEST_SIZE: usize = 32;

pub type Digest32 = [u8; DIGEST_SIZE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("builder has {got} columns, expected {want}")]
    ColumnCountMismatch { got: usize, want: usize },
    #[error("tree is empty")]
    Empty,
    #[error("decommitment is missing node at position {0}")]
    MissingNode(usize),
}

/// Streaming per-column hasher: one SHA-256 context per encoded column,
/// filled one row at a time as the Reed-Solomon encoder produces rows.
pub struct ColumnBuilder {
    hashers: Vec<Sha256>,
}

impl ColumnBuilder {
    pub fn new(num_columns: usize) -> Self {
        Self { hashers: (0..num_columns).map(|_| Sha256::new()).collect() }
    }

    pub fn len(&self) -> usize {
        self.hashers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashers.is_empty()
    }

    /// Absorb one row of field-element limbs into every column's running
    /// hash; `row[i]` feeds column `i`.
    pub fn absorb_row(&mut self, row: &[crate::F]) -> Result<(), MerkleError> {
        if row.len() != self.hashers.len() {
            return Err(MerkleError::ColumnCountMismatch { got: row.len(), want: self.hashers.len() });
        }
        for (h, elem) in self.hashers.iter_mut().zip(row.iter()) {
            h.update(crate::field::to_bytes_le(elem));
        }
        Ok(())
    }

    /// Finalize every column's hasher into its digest, in column order.
    pub fn finalize(self) -> Vec<Digest32> {
        self.hashers
            .into_iter()
            .map(|h| {
                let out = h.finalize();
                let mut d = [0u8; DIGEST_SIZE];
                d.copy_from_slice(&out);
                d
            })
            .collect()
    }
}

/// Hashes an opened column's values (in row order) into the same leaf digest
/// [`ColumnBuilder`] would have produced for that column, so a verifier can
/// recommit revealed columns without re-absorbing the whole stream.
pub fn column_leaf_digest(column: &[crate::F]) -> Digest32 {
    let mut h = Sha256::new();
    for elem in column {
        h.update(crate::field::to_bytes_le(elem));
    }
    let out = h.finalize();
    let mut d = [0u8; DIGEST_SIZE];
    d.copy_from_slice(&out);
    d
}

fn node_hash(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut h = Sha256::new();
    h.update(left);
    h.update(right);
    let out = h.finalize();
    let mut d = [0u8; DIGEST_SIZE];
    d.copy_from_slice(&out);
    d
}

/// A complete binary Merkle tree over column digests, stored as a flat array
/// (index 0 is the root; leaves occupy the back half).
#[derive(Clone, Debug)]
pub struct MerkleTree {
    nodes: Vec<Digest32>,
}

impl MerkleTree {
    /// Builds the tree from `n` leaf digests (padded up to the next power of
    /// two with zero digests if `n` is not already one).
    pub fn from_leaves(mut leaves: Vec<Digest32>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::Empty);
        }
        let padded = leaves.len().next_power_of_two();
        leaves.resize(padded, [0u8; DIGEST_SIZE]);

        let parent_size = padded - 1;
        let mut nodes = vec![[0u8; DIGEST_SIZE]; parent_size + padded];
        nodes[parent_size..].copy_from_slice(&leaves);

        if parent_size > 0 {
            Self::build_layer(&mut nodes, parent_index(parent_size), parent_size);
        }
        Ok(Self { nodes })
    }

    fn build_layer(nodes: &mut [Digest32], start: usize, end: usize) {
        for i in start..end {
            let left = 2 * i + 1;
            let right = left + 1;
            nodes[i] = node_hash(&nodes[left], &nodes[right]);
        }
        if start > 0 {
            Self::build_layer(nodes, parent_index(start), start);
        }
    }

    pub fn root(&self) -> Digest32 {
        self.nodes[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.len() / 2 + 1
    }

    pub fn leaf(&self, i: usize) -> Digest32 {
        self.nodes[self.nodes.len() / 2 + i]
    }

    /// Produces the decommitment proving the leaves at `known_index` without
    /// revealing the rest of the tree.
    pub fn decommit(&self, known_index: &[usize]) -> Decommitment {
        let node_count = self.nodes.len();
        let mut d = Decommitment {
            total_count: node_count,
            known_index: known_index.to_vec(),
            nodes: HashMap::new(),
        };
        let known: HashSet<usize> =
            known_index.iter().map(|&i| node_count / 2 + i).collect();
        self.decommit_helper(&mut d, &known, node_count / 2, node_count);
        d
    }

    fn decommit_helper(&self, d: &mut Decommitment, known: &HashSet<usize>, start: usize, end: usize) {
        if start == 0 {
            return;
        }
        let mut upper = HashSet::new();
        let mut i = start;
        while i < end {
            let (left, right) = (i, i + 1);
            let local_parent = (left - start) / 2;
            let (kl, kr) = (known.contains(&left), known.contains(&right));
            if kl && kr {
                upper.insert(parent_index(start) + local_parent);
            } else if kr {
                d.nodes.insert(left, self.nodes[left]);
                upper.insert(parent_index(start) + local_parent);
            } else if kl {
                d.nodes.insert(right, self.nodes[right]);
                upper.insert(parent_index(start) + local_parent);
            }
            i += 2;
        }
        self.decommit_helper(d, &upper, parent_index(start), start);
    }
}

fn parent_index(curr: usize) -> usize {
    if curr == 0 {
        0
    } else {
        (curr - 1) / 2
    }
}

/// The opening proof for a set of known leaves: enough sibling digests to
/// recompute the root.
#[derive(Clone, Debug)]
pub struct Decommitment {
    pub total_count: usize,
    pub known_index: Vec<usize>,
    pub nodes: HashMap<usize, Digest32>,
}

impl Decommitment {
    pub fn leaf_size(&self) -> usize {
        self.total_count / 2 + 1
    }

    /// Recomputes the root from the revealed leaf digests (in the same order
    /// as `known_index`) and this decommitment's sibling set.
    pub fn recommit(&self, leaves: &[Digest32]) -> Result<Digest32, MerkleError> {
        if leaves.len() != self.known_index.len() {
            return Err(MerkleError::ColumnCountMismatch {
                got: leaves.len(),
                want: self.known_index.len(),
            });
        }
        let mut buffer = vec![[0u8; DIGEST_SIZE]; self.leaf_size()];
        let mut known = HashSet::new();
        let node_count = self.total_count;
        for (i, &idx) in self.known_index.iter().enumerate() {
            let global = node_count / 2 + idx;
            buffer[idx] = leaves[i];
            known.insert(global);
        }
        self.recommit_helper(&mut buffer, &known, node_count / 2, node_count)?;
        Ok(buffer[0])
    }

    fn recommit_helper(
        &self,
        buffer: &mut [Digest32],
        known: &HashSet<usize>,
        start: usize,
        end: usize,
    ) -> Result<(), MerkleError> {
        if start == 0 {
            return Ok(());
        }
        let mut upper = HashSet::new();
        let mut i = start;
        while i < end {
            let (left, right) = (i, i + 1);
            let (local_left, local_right) = (left - start, right - start);
            let local_parent = local_left / 2;
            let global_parent = parent_index(start) + local_parent;
            let (kl, kr) = (known.contains(&left), known.contains(&right));
            if kl && kr {
                buffer[global_parent] = node_hash(&buffer[local_left], &buffer[local_right]);
            } else if kr {
                let saved = self.nodes.get(&left).ok_or(MerkleError::MissingNode(left))?;
                buffer[global_parent] = node_hash(saved, &buffer[local_right]);
            } else if kl {
                let saved = self.nodes.get(&right).ok_or(MerkleError::MissingNode(right))?;
                buffer[global_parent] = node_hash(&buffer[local_left], saved);
            } else {
                i += 2;
                continue;
            }
            upper.insert(global_parent);
            i += 2;
        }
        self.recommit_helper(buffer, &upper, parent_index(start), start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::F;

    fn leaf(b: u8) -> Digest32 {
        let mut d = [0u8; DIGEST_SIZE];
        d[0] = b;
        d
    }

    #[test]
    fn column_builder_absorbs_rows() {
        let mut cb = ColumnBuilder::new(4);
        cb.absorb_row(&[F::from(1u64), F::from(2u64), F::from(3u64), F::from(4u64)])
            .unwrap();
        cb.absorb_row(&[F::from(5u64), F::from(6u64), F::from(7u64), F::from(8u64)])
            .unwrap();
        let digests = cb.finalize();
        assert_eq!(digests.len(), 4);
    }

    #[test]
    fn column_count_mismatch_is_an_error() {
        let mut cb = ColumnBuilder::new(3);
        assert!(cb.absorb_row(&[F::from(1u64)]).is_err());
    }

    #[test]
    fn decommit_recommit_roundtrip() {
        let leaves: Vec<_> = (0..8u8).map(leaf).collect();
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();
        let known = vec![1usize, 5];
        let d = tree.decommit(&known);
        let opened: Vec<_> = known.iter().map(|&i| tree.leaf(i)).collect();
        let root = d.recommit(&opened).unwrap();
        assert_eq!(root, tree.root());
    }

    #[test]
    fn recommit_rejects_wrong_leaf_count() {
        let leaves: Vec<_> = (0..4u8).map(leaf).collect();
        let tree = MerkleTree::from_leaves(leaves).unwrap();
        let d = tree.decommit(&[0]);
        assert!(d.recommit(&[]).is_err());
    }
}
