//! Authenticated key-value tree with inclusion proofs.
//!
//! Entries are kept sorted by key; leaves are hashed in key order and
//! combined pairwise into a binary tree, an odd node being promoted to the
//! next level unchanged. Given the same set of entries, [`MerkleTree::root`]
//! returns the same hash regardless of insertion order.
//!
//! An [`InclusionProof`] carries the sibling hashes from a leaf to the root.
//! The inter-chain plugin only ever consumes it through
//! [`InclusionProof::verify`].

use std::collections::BTreeMap;

use crate::codec::{decode_seq, encode_seq, CodecError, Decode, Encode, Reader};
use crate::crypto::hash_blake3;
use crate::types::{Hash, ZERO_HASH};

/// Domain separator for leaf nodes (prevents second-preimage attacks).
const LEAF_PREFIX: u8 = 0x00;
/// Domain separator for internal nodes.
const INTERNAL_PREFIX: u8 = 0x01;

#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Evidence that a key maps to a value under a given root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// Sibling hashes from the leaf level upward.
    pub siblings: Vec<Hash>,
    /// For each sibling: `true` when the proven node is the left child.
    pub path_bits: Vec<bool>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.entries.insert(key.to_vec(), value.to_vec());
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a batch of writes: `Some(value)` sets, `None` deletes.
    pub fn apply_writes(&mut self, writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>) {
        for (key, value) in writes {
            match value {
                Some(v) => {
                    self.entries.insert(key, v);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Root hash of the tree. The empty tree has `ZERO_HASH`.
    pub fn root(&self) -> Hash {
        let leaves = self.leaf_hashes();
        if leaves.is_empty() {
            return ZERO_HASH;
        }
        let mut level = leaves;
        while level.len() > 1 {
            level = next_level(&level);
        }
        level[0]
    }

    /// Build an inclusion proof for `key`, or `None` if the key is absent.
    pub fn prove(&self, key: &[u8]) -> Option<InclusionProof> {
        let mut idx = self.entries.keys().position(|k| k.as_slice() == key)?;
        let mut level = self.leaf_hashes();
        let mut siblings = Vec::new();
        let mut path_bits = Vec::new();

        while level.len() > 1 {
            let is_left = idx % 2 == 0;
            let sibling_idx = if is_left { idx + 1 } else { idx - 1 };
            // A promoted odd node has no sibling at this level.
            if let Some(sibling) = level.get(sibling_idx) {
                siblings.push(*sibling);
                path_bits.push(is_left);
            }
            level = next_level(&level);
            idx /= 2;
        }

        Some(InclusionProof { siblings, path_bits })
    }

    fn leaf_hashes(&self) -> Vec<Hash> {
        self.entries.iter().map(|(k, v)| hash_leaf(k, v)).collect()
    }
}

impl InclusionProof {
    /// Check that `key` maps to exactly `value` under `root`.
    pub fn verify(&self, root: &Hash, key: &[u8], value: &[u8]) -> bool {
        if self.siblings.len() != self.path_bits.len() {
            return false;
        }
        let mut current = hash_leaf(key, value);
        for (sibling, is_left) in self.siblings.iter().zip(&self.path_bits) {
            current = if *is_left {
                hash_internal(&current, sibling)
            } else {
                hash_internal(sibling, &current)
            };
        }
        current == *root
    }
}

impl Encode for InclusionProof {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        encode_seq(&self.siblings, buf);
        encode_seq(&self.path_bits, buf);
    }
}

impl Decode for InclusionProof {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            siblings: decode_seq(r)?,
            path_bits: decode_seq(r)?,
        })
    }
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_internal(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two hashes"),
        })
        .collect()
}

/// H(LEAF_PREFIX || key_len_le32 || key || value)
fn hash_leaf(key: &[u8], value: &[u8]) -> Hash {
    let mut data = Vec::with_capacity(1 + 4 + key.len() + value.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(&(key.len() as u32).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(value);
    hash_blake3(&data)
}

/// H(INTERNAL_PREFIX || left || right)
fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 65];
    data[0] = INTERNAL_PREFIX;
    data[1..33].copy_from_slice(left);
    data[33..65].copy_from_slice(right);
    hash_blake3(&data)
}
