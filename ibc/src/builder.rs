//! Transaction builders for command-line tooling.
//!
//! Relayers pass headers, commits, packets, and proofs around as hex
//! strings. These helpers decode them, wrap the resulting [`IbcTx`] in a
//! signed `AppTx` addressed to the `ibc` plugin, and return the encoded
//! transaction ready for `check_tx` or `deliver_tx`.

use ed25519_dalek::SigningKey;
use hubchain_engine::{AppTx, Coin, Tx, TxInput};
use hubchain_primitives::{AppError, AppResult, BlockHeight, Decode, Encode, InclusionProof};

use crate::trust::validate_chain_id;
use crate::types::{decode_hex_array, Commit, Header, IbcTx, Packet};
use crate::IBC_NAMESPACE;

/// Signs transactions for one account on one chain.
pub struct TxSigner {
    chain_id: String,
    signing_key: SigningKey,
    sequence: u64,
    fee: Coin,
}

impl TxSigner {
    pub fn new(chain_id: impl Into<String>, signing_key: SigningKey, sequence: u64, fee: Coin) -> Self {
        Self {
            chain_id: chain_id.into(),
            signing_key,
            sequence,
            fee,
        }
    }

    /// Signer from a hex-encoded 32-byte secret key.
    pub fn from_hex_secret(
        chain_id: impl Into<String>,
        secret_hex: &str,
        sequence: u64,
        fee: Coin,
    ) -> AppResult<Self> {
        let secret = decode_hex_array::<32>(secret_hex, "secret key")?;
        Ok(Self::new(chain_id, SigningKey::from_bytes(&secret), sequence, fee))
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encode, sign, and advance the local sequence.
    pub fn sign(&mut self, ibc_tx: &IbcTx) -> Vec<u8> {
        let mut tx = Tx::App(AppTx {
            input: TxInput::new(self.signing_key.verifying_key().to_bytes(), self.sequence),
            fee: self.fee.clone(),
            name: IBC_NAMESPACE.to_string(),
            payload: ibc_tx.encode(),
        });
        tx.sign(&self.chain_id, &self.signing_key);
        self.sequence += 1;
        tx.encode()
    }
}

fn decode_hex<T: Decode>(value: &str, what: &str) -> AppResult<T> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| AppError::encoding(format!("{what} is not valid hex: {e}")))?;
    T::decode(&bytes).map_err(|e| AppError::encoding(format!("invalid {what}: {e}")))
}

pub fn register_chain_tx(signer: &mut TxSigner, chain_id: &str, genesis: &str) -> AppResult<Vec<u8>> {
    validate_chain_id(chain_id)?;
    Ok(signer.sign(&IbcTx::RegisterChain {
        chain_id: chain_id.to_string(),
        genesis: genesis.to_string(),
    }))
}

pub fn update_chain_tx(signer: &mut TxSigner, header_hex: &str, commit_hex: &str) -> AppResult<Vec<u8>> {
    let header: Header = decode_hex(header_hex, "header")?;
    let commit: Commit = decode_hex(commit_hex, "commit")?;
    Ok(signer.sign(&IbcTx::UpdateChain { header, commit }))
}

pub fn create_packet_tx(
    signer: &mut TxSigner,
    src_chain_id: &str,
    dst_chain_id: &str,
    packet_type: &str,
    payload_hex: &str,
) -> AppResult<Vec<u8>> {
    validate_chain_id(src_chain_id)?;
    validate_chain_id(dst_chain_id)?;
    let payload = hex::decode(payload_hex.trim())
        .map_err(|e| AppError::encoding(format!("payload is not valid hex: {e}")))?;
    Ok(signer.sign(&IbcTx::CreatePacket {
        src_chain_id: src_chain_id.to_string(),
        dst_chain_id: dst_chain_id.to_string(),
        packet_type: packet_type.to_string(),
        payload,
    }))
}

pub fn post_packet_tx(
    signer: &mut TxSigner,
    from_chain_id: &str,
    from_height: BlockHeight,
    packet_hex: &str,
    proof_hex: &str,
) -> AppResult<Vec<u8>> {
    validate_chain_id(from_chain_id)?;
    let packet: Packet = decode_hex(packet_hex, "packet")?;
    let proof: InclusionProof = decode_hex(proof_hex, "proof")?;
    Ok(signer.sign(&IbcTx::PostPacket {
        from_chain_id: from_chain_id.to_string(),
        from_height,
        packet,
        proof,
    }))
}
