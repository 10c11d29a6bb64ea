//! Inter-chain wire types.
//!
//! ## Transaction payload (inside an `AppTx` addressed to `ibc`)
//!
//! ```text
//! IbcTx = tag:u8 body
//!   0x01  RegisterChain { chain_id: str, genesis: str }
//!   0x02  UpdateChain   { header: Header, commit: Commit }
//!   0x03  CreatePacket  { src: str, dst: str, packet_type: str, payload: bytes }
//!   0x04  PostPacket    { from_chain_id: str, from_height: u64, packet: Packet, proof: InclusionProof }
//! ```

use hubchain_primitives::codec::{decode_seq, encode_seq, CodecError, Decode, Encode, Reader};
use hubchain_primitives::crypto::hash_sha256;
use hubchain_primitives::{AppError, AppResult, BlockHeight, Hash, InclusionProof, Validator, ValidatorSet};
use serde::{Deserialize, Serialize};

pub const IBC_TAG_REGISTER_CHAIN: u8 = 0x01;
pub const IBC_TAG_UPDATE_CHAIN: u8 = 0x02;
pub const IBC_TAG_CREATE_PACKET: u8 = 0x03;
pub const IBC_TAG_POST_PACKET: u8 = 0x04;

/// Domain prefix of the bytes a foreign validator signs.
const VOTE_DOMAIN: &str = "hubchain/vote";

/// A foreign chain's genesis document as submitted for registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    /// Hex-encoded initial state root.
    pub app_hash: String,
    pub validators: Vec<GenesisValidator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    pub power: u64,
}

/// Parsed and hashed genesis document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainGenesis {
    pub chain_id: String,
    pub app_hash: Hash,
    pub validators: ValidatorSet,
    /// SHA-256 of the document bytes. Trusted header hash at height 0.
    pub genesis_hash: Hash,
}

impl ChainGenesis {
    pub fn parse(document: &str) -> AppResult<Self> {
        let doc: GenesisDoc = serde_json::from_str(document)
            .map_err(|e| AppError::encoding(format!("invalid genesis document: {e}")))?;
        let app_hash = decode_hex_array::<32>(&doc.app_hash, "app_hash")?;
        let validators = doc
            .validators
            .iter()
            .map(|v| {
                Ok(Validator {
                    public_key: decode_hex_array::<32>(&v.public_key, "validator public key")?,
                    power: v.power,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        let validators = ValidatorSet::new(validators);
        if validators.total_power() == 0 {
            return Err(AppError::invalid_input("genesis validator set has no voting power"));
        }
        Ok(Self {
            chain_id: doc.chain_id,
            app_hash,
            validators,
            genesis_hash: hash_sha256(document.as_bytes()),
        })
    }
}

pub(crate) fn decode_hex_array<const N: usize>(s: &str, what: &str) -> AppResult<[u8; N]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| AppError::encoding(format!("{what} is not hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| AppError::encoding(format!("{what} must be {N} bytes")))
}

/// Foreign block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub chain_id: String,
    pub height: BlockHeight,
    pub time: u64,
    /// Hash of the previous trusted header (genesis hash at height 1).
    pub last_block_hash: Hash,
    /// State root committed by this header.
    pub app_hash: Hash,
    /// Hash of the validator set that signs this header.
    pub validators_hash: Hash,
    /// Validator set for the following headers. Empty means unchanged.
    pub next_validators: Vec<Validator>,
}

impl Header {
    pub fn hash(&self) -> Hash {
        hash_sha256(&self.encode())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSig {
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// Validator signatures over one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    pub signatures: Vec<CommitSig>,
}

/// Bytes a validator signs to vote for `header_hash`.
pub fn vote_sign_bytes(chain_id: &str, height: BlockHeight, header_hash: &Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + chain_id.len());
    VOTE_DOMAIN.encode_to(&mut buf);
    chain_id.encode_to(&mut buf);
    height.encode_to(&mut buf);
    header_hash.encode_to(&mut buf);
    buf
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub src_chain_id: String,
    pub dst_chain_id: String,
    pub sequence: u64,
    pub packet_type: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IbcTx {
    RegisterChain {
        chain_id: String,
        /// The genesis document, verbatim.
        genesis: String,
    },
    UpdateChain {
        header: Header,
        commit: Commit,
    },
    CreatePacket {
        src_chain_id: String,
        dst_chain_id: String,
        packet_type: String,
        payload: Vec<u8>,
    },
    PostPacket {
        from_chain_id: String,
        from_height: BlockHeight,
        packet: Packet,
        proof: InclusionProof,
    },
}

impl IbcTx {
    pub fn kind(&self) -> &'static str {
        match self {
            IbcTx::RegisterChain { .. } => "register_chain",
            IbcTx::UpdateChain { .. } => "update_chain",
            IbcTx::CreatePacket { .. } => "create_packet",
            IbcTx::PostPacket { .. } => "post_packet",
        }
    }
}

impl Encode for Header {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.chain_id.encode_to(buf);
        self.height.encode_to(buf);
        self.time.encode_to(buf);
        self.last_block_hash.encode_to(buf);
        self.app_hash.encode_to(buf);
        self.validators_hash.encode_to(buf);
        encode_seq(&self.next_validators, buf);
    }
}

impl Decode for Header {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            chain_id: String::decode_from(r)?,
            height: r.read_u64()?,
            time: r.read_u64()?,
            last_block_hash: r.read_array()?,
            app_hash: r.read_array()?,
            validators_hash: r.read_array()?,
            next_validators: decode_seq(r)?,
        })
    }
}

impl Encode for CommitSig {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.public_key.encode_to(buf);
        self.signature.encode_to(buf);
    }
}

impl Decode for CommitSig {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            public_key: r.read_array()?,
            signature: r.read_array()?,
        })
    }
}

impl Encode for Commit {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        encode_seq(&self.signatures, buf);
    }
}

impl Decode for Commit {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            signatures: decode_seq(r)?,
        })
    }
}

impl Encode for Packet {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.src_chain_id.encode_to(buf);
        self.dst_chain_id.encode_to(buf);
        self.sequence.encode_to(buf);
        self.packet_type.encode_to(buf);
        self.payload.encode_to(buf);
    }
}

impl Decode for Packet {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            src_chain_id: String::decode_from(r)?,
            dst_chain_id: String::decode_from(r)?,
            sequence: r.read_u64()?,
            packet_type: String::decode_from(r)?,
            payload: Vec::<u8>::decode_from(r)?,
        })
    }
}

impl Encode for IbcTx {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            IbcTx::RegisterChain { chain_id, genesis } => {
                buf.push(IBC_TAG_REGISTER_CHAIN);
                chain_id.encode_to(buf);
                genesis.encode_to(buf);
            }
            IbcTx::UpdateChain { header, commit } => {
                buf.push(IBC_TAG_UPDATE_CHAIN);
                header.encode_to(buf);
                commit.encode_to(buf);
            }
            IbcTx::CreatePacket {
                src_chain_id,
                dst_chain_id,
                packet_type,
                payload,
            } => {
                buf.push(IBC_TAG_CREATE_PACKET);
                src_chain_id.encode_to(buf);
                dst_chain_id.encode_to(buf);
                packet_type.encode_to(buf);
                payload.encode_to(buf);
            }
            IbcTx::PostPacket {
                from_chain_id,
                from_height,
                packet,
                proof,
            } => {
                buf.push(IBC_TAG_POST_PACKET);
                from_chain_id.encode_to(buf);
                from_height.encode_to(buf);
                packet.encode_to(buf);
                proof.encode_to(buf);
            }
        }
    }
}

impl Decode for IbcTx {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            IBC_TAG_REGISTER_CHAIN => Ok(IbcTx::RegisterChain {
                chain_id: String::decode_from(r)?,
                genesis: String::decode_from(r)?,
            }),
            IBC_TAG_UPDATE_CHAIN => Ok(IbcTx::UpdateChain {
                header: Header::decode_from(r)?,
                commit: Commit::decode_from(r)?,
            }),
            IBC_TAG_CREATE_PACKET => Ok(IbcTx::CreatePacket {
                src_chain_id: String::decode_from(r)?,
                dst_chain_id: String::decode_from(r)?,
                packet_type: String::decode_from(r)?,
                payload: Vec::<u8>::decode_from(r)?,
            }),
            IBC_TAG_POST_PACKET => Ok(IbcTx::PostPacket {
                from_chain_id: String::decode_from(r)?,
                from_height: r.read_u64()?,
                packet: Packet::decode_from(r)?,
                proof: InclusionProof::decode_from(r)?,
            }),
            tag => Err(CodecError::InvalidTag { ty: "IbcTx", tag }),
        }
    }
}
