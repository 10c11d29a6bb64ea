//! Local handlers for admitted packets, selected by packet type.

use hubchain_engine::ledger::{credit, debit};
use hubchain_engine::Coins;
use hubchain_primitives::codec::{CodecError, Decode, Encode, Reader};
use hubchain_primitives::crypto::hash_blake3;
use hubchain_primitives::types::to_hex;
use hubchain_primitives::{Address, AppError, AppResult, State};
use tracing::debug;

use crate::types::Packet;

pub const COIN_PACKET_TYPE: &str = "coin";

/// Consumes the payload of an admitted packet.
///
/// `handle` runs inside the same cache-wrap as the ingress counter
/// increment, so an error also rolls the counter back. `on_send` runs on
/// the source chain inside the same cache-wrap as the egress write.
pub trait PacketHandler: Send + Sync {
    fn packet_type(&self) -> &str;

    /// Source-side effects of queuing `packet` on behalf of `sender`.
    fn on_send(&self, _state: &mut dyn State, _sender: &Address, _packet: &Packet) -> AppResult<()> {
        Ok(())
    }

    /// Apply the packet and return a log line.
    fn handle(&self, state: &mut dyn State, packet: &Packet) -> AppResult<String>;
}

/// Account holding coins sent toward `dst_chain_id`. No key controls it.
pub fn escrow_address(dst_chain_id: &str) -> Address {
    hash_blake3(format!("hubchain/escrow/{dst_chain_id}").as_bytes())
}

/// Payload of a `coin` packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinPacket {
    pub recipient: Address,
    pub coins: Coins,
}

impl Encode for CoinPacket {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.recipient.encode_to(buf);
        self.coins.encode_to(buf);
    }
}

impl Decode for CoinPacket {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            recipient: r.read_array()?,
            coins: Coins::decode_from(r)?,
        })
    }
}

impl CoinPacket {
    fn from_packet(packet: &Packet) -> AppResult<Self> {
        let coin_packet = CoinPacket::decode(&packet.payload)
            .map_err(|e| AppError::encoding(format!("invalid coin packet: {e}")))?;
        if coin_packet.coins.is_zero() || !coin_packet.coins.is_valid() {
            return Err(AppError::invalid_input("coin packet carries no valid coins"));
        }
        Ok(coin_packet)
    }
}

/// Escrows the sender's coins on the source chain and credits the
/// recipient named in a [`CoinPacket`] on the destination.
pub struct CoinHandler;

impl PacketHandler for CoinHandler {
    fn packet_type(&self) -> &str {
        COIN_PACKET_TYPE
    }

    fn on_send(&self, state: &mut dyn State, sender: &Address, packet: &Packet) -> AppResult<()> {
        let coin_packet = CoinPacket::from_packet(packet)?;
        let escrow = escrow_address(&packet.dst_chain_id);
        debit(state, sender, &coin_packet.coins)?;
        credit(state, &escrow, &coin_packet.coins)?;
        debug!(
            dst = %packet.dst_chain_id,
            sequence = packet.sequence,
            sender = %to_hex(sender),
            coins = %coin_packet.coins,
            "coin packet escrowed"
        );
        Ok(())
    }

    fn handle(&self, state: &mut dyn State, packet: &Packet) -> AppResult<String> {
        let coin_packet = CoinPacket::from_packet(packet)?;
        credit(state, &coin_packet.recipient, &coin_packet.coins)?;
        debug!(
            src = %packet.src_chain_id,
            sequence = packet.sequence,
            recipient = %to_hex(&coin_packet.recipient),
            coins = %coin_packet.coins,
            "coin packet credited"
        );
        Ok(format!(
            "credited {} to {}",
            coin_packet.coins,
            to_hex(&coin_packet.recipient)
        ))
    }
}
