//! Boundary to the persistent authenticated key-value store.
//!
//! The driver reads committed state through [`ReadStore`] views and hands
//! the block's buffered writes to [`CommitStore::commit`], which persists
//! them and returns the new Merkle root. Proof-capable reads answer
//! `query` requests.
//!
//! Implementations:
//! - [`MemStore`] (this crate): in-memory Merkle tree, copy-on-write views
//! - an on-disk Merkle store lives outside this repository

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::merkle::{InclusionProof, MerkleTree};
use crate::types::{BlockHeight, Hash};

/// Buffered writes keyed in deterministic order: `Some` sets, `None` deletes.
pub type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(String),
    #[error("root hash computation failed: {0}")]
    Hash(String),
}

/// Read access to one committed version of the store.
///
/// Implementations must be deterministic: a given view always returns the
/// same value for the same key.
pub trait ReadStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Answer to a proof-capable read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    /// Present when requested and the key exists.
    pub proof: Option<InclusionProof>,
    /// Version the answer was read at.
    pub height: BlockHeight,
}

/// The persistent store as seen by the driver.
pub trait CommitStore: Send + Sync {
    /// Immutable view of the latest committed version.
    fn latest(&self) -> Arc<dyn ReadStore>;

    /// Persist `writes` as a new version and return its root.
    ///
    /// A failure here leaves the authoritative root indeterminate.
    fn commit(&mut self, writes: WriteSet) -> Result<Hash, StoreError>;

    fn root_hash(&self) -> Hash;

    /// Number of versions committed so far.
    fn version(&self) -> BlockHeight;

    fn query(&self, key: &[u8], prove: bool) -> Result<QueryOutput, StoreError>;
}

impl ReadStore for MerkleTree {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(MerkleTree::get(self, key).map(<[u8]>::to_vec))
    }
}

/// In-memory [`CommitStore`].
///
/// Views share the committed tree through an `Arc`; a commit clones the
/// tree only while an older view is still alive.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    tree: Arc<MerkleTree>,
    version: BlockHeight,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose version 0 holds `entries`.
    pub fn with_entries(entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        let mut tree = MerkleTree::new();
        for (k, v) in &entries {
            tree.insert(k, v);
        }
        Self {
            tree: Arc::new(tree),
            version: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl CommitStore for MemStore {
    fn latest(&self) -> Arc<dyn ReadStore> {
        self.tree.clone()
    }

    fn commit(&mut self, writes: WriteSet) -> Result<Hash, StoreError> {
        Arc::make_mut(&mut self.tree).apply_writes(writes);
        self.version += 1;
        Ok(self.tree.root())
    }

    fn root_hash(&self) -> Hash {
        self.tree.root()
    }

    fn version(&self) -> BlockHeight {
        self.version
    }

    fn query(&self, key: &[u8], prove: bool) -> Result<QueryOutput, StoreError> {
        let value = self.tree.get(key).map(<[u8]>::to_vec);
        let proof = match (&value, prove) {
            (Some(_), true) => self.tree.prove(key),
            _ => None,
        };
        Ok(QueryOutput {
            key: key.to_vec(),
            value,
            proof,
            height: self.version,
        })
    }
}
