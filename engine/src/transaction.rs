//! Transaction wire types, encoding, and signing.
//!
//! ## Wire format
//!
//! ```text
//! Tx      = tag:u8 body
//!   0x01  SendTx { input, outputs: seq<TxOutput>, fee: Coin }
//!   0x02  AppTx  { input, fee: Coin, name: str, payload: bytes }
//! TxInput = address:32 sequence:u64 public_key:32 signature:64
//! ```
//!
//! The signature covers `chain_id || tx` where `tx` is the full encoding
//! with the signature field zeroed. Binding the chain id prevents a
//! transaction from being replayed on another chain.

use ed25519_dalek::SigningKey;
use hubchain_primitives::codec::{decode_seq, encode_seq, CodecError, Decode, Encode, Reader};
use hubchain_primitives::crypto::{address_from_public_key, sign_ed25519};
use hubchain_primitives::Address;

use crate::coins::{Coin, Coins};

pub const TX_TAG_SEND: u8 = 0x01;
pub const TX_TAG_APP: u8 = 0x02;

/// The signing account of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub address: Address,
    pub sequence: u64,
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

impl TxInput {
    /// Unsigned input for the account controlled by `public_key`.
    pub fn new(public_key: [u8; 32], sequence: u64) -> Self {
        Self {
            address: address_from_public_key(&public_key),
            sequence,
            public_key,
            signature: [0u8; 64],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub coins: Coins,
}

/// Core ledger transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTx {
    pub input: TxInput,
    pub outputs: Vec<TxOutput>,
    pub fee: Coin,
}

/// Opaque call into a named plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTx {
    pub input: TxInput,
    pub fee: Coin,
    pub name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tx {
    Send(SendTx),
    App(AppTx),
}

impl Tx {
    pub fn input(&self) -> &TxInput {
        match self {
            Tx::Send(tx) => &tx.input,
            Tx::App(tx) => &tx.input,
        }
    }

    fn input_mut(&mut self) -> &mut TxInput {
        match self {
            Tx::Send(tx) => &mut tx.input,
            Tx::App(tx) => &mut tx.input,
        }
    }

    /// Bytes covered by the input signature.
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.input_mut().signature = [0u8; 64];
        let mut buf = Vec::with_capacity(128);
        chain_id.encode_to(&mut buf);
        unsigned.encode_to(&mut buf);
        buf
    }

    /// Fill in the public key, address, and signature for `signing_key`.
    pub fn sign(&mut self, chain_id: &str, signing_key: &SigningKey) {
        let public_key = signing_key.verifying_key().to_bytes();
        {
            let input = self.input_mut();
            input.public_key = public_key;
            input.address = address_from_public_key(&public_key);
        }
        let signature = sign_ed25519(&self.sign_bytes(chain_id), signing_key);
        self.input_mut().signature = signature;
    }
}

impl SendTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        Tx::Send(self.clone()).sign_bytes(chain_id)
    }
}

impl AppTx {
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        Tx::App(self.clone()).sign_bytes(chain_id)
    }
}

impl Encode for TxInput {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.address.encode_to(buf);
        self.sequence.encode_to(buf);
        self.public_key.encode_to(buf);
        self.signature.encode_to(buf);
    }
}

impl Decode for TxInput {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: r.read_array()?,
            sequence: r.read_u64()?,
            public_key: r.read_array()?,
            signature: r.read_array()?,
        })
    }
}

impl Encode for TxOutput {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.address.encode_to(buf);
        self.coins.encode_to(buf);
    }
}

impl Decode for TxOutput {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            address: r.read_array()?,
            coins: Coins::decode_from(r)?,
        })
    }
}

impl Encode for Tx {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            Tx::Send(tx) => {
                buf.push(TX_TAG_SEND);
                tx.input.encode_to(buf);
                encode_seq(&tx.outputs, buf);
                tx.fee.encode_to(buf);
            }
            Tx::App(tx) => {
                buf.push(TX_TAG_APP);
                tx.input.encode_to(buf);
                tx.fee.encode_to(buf);
                tx.name.encode_to(buf);
                tx.payload.encode_to(buf);
            }
        }
    }
}

impl Decode for Tx {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            TX_TAG_SEND => Ok(Tx::Send(SendTx {
                input: TxInput::decode_from(r)?,
                outputs: decode_seq(r)?,
                fee: Coin::decode_from(r)?,
            })),
            TX_TAG_APP => Ok(Tx::App(AppTx {
                input: TxInput::decode_from(r)?,
                fee: Coin::decode_from(r)?,
                name: String::decode_from(r)?,
                payload: Vec::<u8>::decode_from(r)?,
            })),
            tag => Err(CodecError::InvalidTag { ty: "Tx", tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubchain_primitives::crypto::verify_ed25519;

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn send_tx(sequence: u64) -> Tx {
        let pk = key(1).verifying_key().to_bytes();
        Tx::Send(SendTx {
            input: TxInput::new(pk, sequence),
            outputs: vec![TxOutput {
                address: [9u8; 32],
                coins: Coins::single(Coin::new("atom", 10)),
            }],
            fee: Coin::new("atom", 1),
        })
    }

    #[test]
    fn test_signed_tx_verifies() {
        let mut tx = send_tx(0);
        tx.sign("hub-test", &key(1));
        let input = tx.input();
        assert!(verify_ed25519(
            &tx.sign_bytes("hub-test"),
            &input.signature,
            &input.public_key
        ));
    }

    #[test]
    fn test_sign_bytes_bind_chain_id() {
        let mut tx = send_tx(0);
        tx.sign("hub-test", &key(1));
        assert_ne!(tx.sign_bytes("hub-test"), tx.sign_bytes("other"));
        let input = tx.input();
        assert!(!verify_ed25519(
            &tx.sign_bytes("other"),
            &input.signature,
            &input.public_key
        ));
    }

    #[test]
    fn test_sign_bytes_ignore_signature() {
        let mut tx = send_tx(3);
        let before = tx.sign_bytes("c");
        tx.sign("c", &key(1));
        assert_eq!(tx.sign_bytes("c"), before);
    }

    #[test]
    fn test_tx_decode() {
        let mut tx = send_tx(7);
        tx.sign("c", &key(1));
        assert_eq!(Tx::decode(&tx.encode()).unwrap(), tx);

        let app = Tx::App(AppTx {
            input: TxInput::new(key(2).verifying_key().to_bytes(), 0),
            fee: Coin::new("atom", 0),
            name: "ibc".into(),
            payload: vec![1, 2, 3],
        });
        assert_eq!(Tx::decode(&app.encode()).unwrap(), app);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut bytes = send_tx(0).encode();
        bytes[0] = 0x7F;
        assert_eq!(
            Tx::decode(&bytes),
            Err(CodecError::InvalidTag { ty: "Tx", tag: 0x7F })
        );
    }

    #[test]
    fn test_input_address_derived_from_key() {
        let pk = key(4).verifying_key().to_bytes();
        assert_eq!(TxInput::new(pk, 0).address, address_from_public_key(&pk));
    }
}
