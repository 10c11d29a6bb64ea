//! Dual-state store overlay.
//!
//! Two layers sit on top of the persistent store:
//!
//! - [`Snapshot`]: a long-lived write buffer over one committed version.
//!   The driver keeps two of them, one for authoritative delivery and one
//!   for speculative checking. They share only the immutable committed
//!   view, never a write buffer.
//! - [`CacheWrap`]: a nested buffer over any [`State`]. Its writes are
//!   invisible to the parent until [`CacheWrap::commit`]; dropping it (or
//!   calling [`CacheWrap::discard`]) leaves the parent untouched.
//!
//! Reads always check the buffer first and fall through to the parent.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppResult;
use crate::store::{ReadStore, WriteSet};

/// Keyed byte state as seen by the ledger and by plugins.
pub trait State {
    fn get(&self, key: &[u8]) -> AppResult<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]);

    fn remove(&mut self, key: &[u8]);

    fn contains(&self, key: &[u8]) -> AppResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Write buffer: key → `Some(value)` for sets, `None` for deletions.
///
/// `BTreeMap` keeps flush order deterministic.
#[derive(Debug, Clone, Default)]
pub struct StateOverlay {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// Result of looking up a key in the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayResult {
    Found(Vec<u8>),
    /// Explicitly deleted in this overlay.
    Deleted,
    /// Untouched: the caller must consult the layer below.
    NotInOverlay,
}

impl StateOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    pub fn get(&self, key: &[u8]) -> OverlayResult {
        match self.writes.get(key) {
            Some(Some(value)) => OverlayResult::Found(value.clone()),
            Some(None) => OverlayResult::Deleted,
            None => OverlayResult::NotInOverlay,
        }
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}

/// Buffered writes over one committed version of the persistent store.
pub struct Snapshot {
    base: Arc<dyn ReadStore>,
    overlay: StateOverlay,
}

impl Snapshot {
    pub fn new(base: Arc<dyn ReadStore>) -> Self {
        Self {
            base,
            overlay: StateOverlay::new(),
        }
    }

    /// Number of keys touched since this snapshot was created.
    pub fn pending(&self) -> usize {
        self.overlay.len()
    }

    /// Consume the snapshot, yielding its writes for the persistent commit.
    pub fn into_writes(self) -> WriteSet {
        self.overlay.into_writes()
    }
}

impl State for Snapshot {
    fn get(&self, key: &[u8]) -> AppResult<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            OverlayResult::Found(value) => Ok(Some(value)),
            OverlayResult::Deleted => Ok(None),
            OverlayResult::NotInOverlay => Ok(self.base.get(key)?),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.overlay.set(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.overlay.delete(key.to_vec());
    }
}

/// Nested copy-on-write buffer over a parent [`State`].
pub struct CacheWrap<'a> {
    parent: &'a mut (dyn State + 'a),
    overlay: StateOverlay,
}

impl<'a> CacheWrap<'a> {
    pub fn new(parent: &'a mut (dyn State + 'a)) -> Self {
        Self {
            parent,
            overlay: StateOverlay::new(),
        }
    }

    /// Flush every buffered write into the parent.
    pub fn commit(self) {
        let writes = self.overlay.into_writes();
        apply_writes(self.parent, &writes);
    }

    /// Drop every buffered write.
    pub fn discard(self) {}

    /// Detach the buffered writes without touching the parent, so the
    /// caller can replay them elsewhere with [`apply_writes`].
    pub fn into_writes(self) -> WriteSet {
        self.overlay.into_writes()
    }
}

/// Replay a write set into `state` in key order.
pub fn apply_writes(state: &mut dyn State, writes: &WriteSet) {
    for (key, value) in writes {
        match value {
            Some(v) => state.set(key, v),
            None => state.remove(key),
        }
    }
}

impl State for CacheWrap<'_> {
    fn get(&self, key: &[u8]) -> AppResult<Option<Vec<u8>>> {
        match self.overlay.get(key) {
            OverlayResult::Found(value) => Ok(Some(value)),
            OverlayResult::Deleted => Ok(None),
            OverlayResult::NotInOverlay => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.overlay.set(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.overlay.delete(key.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MerkleTree;

    fn base_with(entries: &[(&[u8], &[u8])]) -> Arc<dyn ReadStore> {
        let mut tree = MerkleTree::new();
        for (k, v) in entries {
            tree.insert(k, v);
        }
        Arc::new(tree)
    }

    #[test]
    fn test_overlay_delete_then_set() {
        let mut overlay = StateOverlay::new();
        overlay.delete(b"k".to_vec());
        assert_eq!(overlay.get(b"k"), OverlayResult::Deleted);
        overlay.set(b"k".to_vec(), b"v".to_vec());
        assert_eq!(overlay.get(b"k"), OverlayResult::Found(b"v".to_vec()));
        assert_eq!(overlay.get(b"other"), OverlayResult::NotInOverlay);
    }

    #[test]
    fn test_overlay_writes_sorted() {
        let mut overlay = StateOverlay::new();
        overlay.set(b"c".to_vec(), b"3".to_vec());
        overlay.set(b"a".to_vec(), b"1".to_vec());
        overlay.delete(b"b".to_vec());
        let keys: Vec<Vec<u8>> = overlay.into_writes().into_keys().collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_snapshot_reads_fall_through() {
        let mut snap = Snapshot::new(base_with(&[(b"k", b"base")]));
        assert_eq!(snap.get(b"k").unwrap(), Some(b"base".to_vec()));

        snap.set(b"k", b"over");
        assert_eq!(snap.get(b"k").unwrap(), Some(b"over".to_vec()));

        snap.remove(b"k");
        assert_eq!(snap.get(b"k").unwrap(), None);
        assert_eq!(snap.pending(), 1);
    }

    #[test]
    fn test_snapshots_over_same_base_are_isolated() {
        let base = base_with(&[(b"shared", b"0")]);
        let mut deliver = Snapshot::new(base.clone());
        let check = Snapshot::new(base);

        deliver.set(b"shared", b"1");
        assert_eq!(check.get(b"shared").unwrap(), Some(b"0".to_vec()));
    }

    #[test]
    fn test_cache_wrap_invisible_until_commit() {
        let mut snap = Snapshot::new(base_with(&[]));
        {
            let mut child = CacheWrap::new(&mut snap);
            child.set(b"k", b"v");
            assert_eq!(child.get(b"k").unwrap(), Some(b"v".to_vec()));
            child.commit();
        }
        assert_eq!(snap.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_cache_wrap_discard_leaves_parent_untouched() {
        let mut snap = Snapshot::new(base_with(&[(b"k", b"base")]));
        {
            let mut child = CacheWrap::new(&mut snap);
            child.set(b"k", b"changed");
            child.remove(b"k");
            child.set(b"new", b"x");
            child.discard();
        }
        assert_eq!(snap.get(b"k").unwrap(), Some(b"base".to_vec()));
        assert_eq!(snap.get(b"new").unwrap(), None);
        assert_eq!(snap.pending(), 0);
    }

    #[test]
    fn test_nested_cache_wraps() {
        let mut snap = Snapshot::new(base_with(&[]));
        {
            let mut outer = CacheWrap::new(&mut snap);
            outer.set(b"outer", b"1");
            {
                let mut inner = CacheWrap::new(&mut outer);
                assert_eq!(inner.get(b"outer").unwrap(), Some(b"1".to_vec()));
                inner.set(b"inner", b"2");
                inner.commit();
            }
            assert_eq!(outer.get(b"inner").unwrap(), Some(b"2".to_vec()));
            outer.commit();
        }
        let writes = snap.into_writes();
        assert_eq!(writes.len(), 2);
    }

    #[test]
    fn test_detached_writes_replay_into_two_snapshots() {
        let base = base_with(&[(b"k", b"base")]);
        let mut a = Snapshot::new(base.clone());
        let mut b = Snapshot::new(base);
        let writes = {
            let mut child = CacheWrap::new(&mut a);
            child.set(b"n", b"1");
            child.remove(b"k");
            child.into_writes()
        };
        assert_eq!(a.pending(), 0);

        apply_writes(&mut a, &writes);
        apply_writes(&mut b, &writes);
        for snap in [&a, &b] {
            assert_eq!(snap.get(b"n").unwrap(), Some(b"1".to_vec()));
            assert_eq!(snap.get(b"k").unwrap(), None);
        }
    }

    #[test]
    fn test_cache_wrap_commit_propagates_deletes() {
        let mut snap = Snapshot::new(base_with(&[(b"k", b"base")]));
        {
            let mut child = CacheWrap::new(&mut snap);
            child.remove(b"k");
            child.commit();
        }
        assert_eq!(snap.get(b"k").unwrap(), None);
        assert_eq!(snap.into_writes().get(b"k".as_slice()), Some(&None));
    }
}
