//! Block header and validator types handed to the application by the
//! consensus engine.
//!
//! The application never validates these; it only records them and passes
//! them on to plugins at block boundaries.

use crate::codec::{decode_seq, encode_seq, CodecError, Decode, Encode, Reader};
use crate::crypto::hash_sha256;
use crate::types::{BlockHeight, Hash};

/// A validator identity and its voting power.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub public_key: [u8; 32],
    pub power: u64,
}

/// An ordered validator set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Sum of all voting power. Saturates rather than wrapping.
    pub fn total_power(&self) -> u64 {
        self.validators
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.power))
    }

    /// Voting power of `public_key`, or `None` if it is not in the set.
    pub fn power_of(&self, public_key: &[u8; 32]) -> Option<u64> {
        self.validators
            .iter()
            .find(|v| &v.public_key == public_key)
            .map(|v| v.power)
    }

    /// SHA-256 of the canonical encoding. Order-sensitive.
    pub fn hash(&self) -> Hash {
        hash_sha256(&self.encode())
    }
}

/// Block header as delivered in `begin_block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: BlockHeight,
    /// Logical time from consensus, seconds.
    pub time: u64,
    pub last_block_hash: Hash,
    /// State root after the previous block.
    pub app_hash: Hash,
    pub num_txs: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        hash_sha256(&self.encode())
    }
}

impl Encode for Validator {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.public_key.encode_to(buf);
        self.power.encode_to(buf);
    }
}

impl Decode for Validator {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            public_key: r.read_array()?,
            power: r.read_u64()?,
        })
    }
}

impl Encode for ValidatorSet {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        encode_seq(&self.validators, buf);
    }
}

impl Decode for ValidatorSet {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            validators: decode_seq(r)?,
        })
    }
}

impl Encode for BlockHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.chain_id.encode_to(buf);
        self.height.encode_to(buf);
        self.time.encode_to(buf);
        self.last_block_hash.encode_to(buf);
        self.app_hash.encode_to(buf);
        self.num_txs.encode_to(buf);
    }
}

impl Decode for BlockHeader {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            chain_id: String::decode_from(r)?,
            height: r.read_u64()?,
            time: r.read_u64()?,
            last_block_hash: r.read_array()?,
            app_hash: r.read_array()?,
            num_txs: r.read_u32()?,
        })
    }
}
