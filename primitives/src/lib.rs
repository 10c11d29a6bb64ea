//! `hubchain-primitives`: foundational types for the hubchain application layer.
//!
//! This crate provides the canonical types, error taxonomy, deterministic
//! binary codec, cryptographic operations, Merkle tree with inclusion proofs,
//! the persistent-store boundary, and the copy-on-write state snapshots
//! shared by the state-machine driver and every plugin.

pub mod types;
pub mod error;
pub mod codec;
pub mod crypto;
pub mod merkle;
pub mod store;
pub mod state;
pub mod block;

// Re-export commonly used types at the crate root for convenience.
pub use types::{Address, BlockHeight, Hash, ZERO_HASH};
pub use error::{AppError, AppResult, ErrorKind, FatalError};
pub use codec::{CodecError, Decode, Encode, Reader};
pub use block::{BlockHeader, Validator, ValidatorSet};
pub use merkle::{InclusionProof, MerkleTree};
pub use store::{CommitStore, MemStore, QueryOutput, ReadStore, StoreError, WriteSet};
pub use state::{apply_writes, CacheWrap, OverlayResult, Snapshot, State, StateOverlay};
