//! Packet egress and proven ingress.
//!
//! Every ordered pair of chains is a channel with two counters:
//!
//! ```text
//! ibc/egress/<src>/<dst>         next sequence to assign on the source
//! ibc/egress/<src>/<dst>/<seq>   encoded packet, provable under the source root
//! ibc/ingress/<src>/<dst>        next sequence to admit on the destination
//! ```
//!
//! A packet is admitted only with an inclusion proof of its exact bytes
//! at the egress key, checked against a root this chain already trusts,
//! and only at the ingress counter. Replays and gaps are both rejected.

use hubchain_primitives::types::{join_key, to_hex, u64_from_le_bytes};
use hubchain_primitives::{AppError, AppResult, BlockHeight, CacheWrap, Encode, ErrorKind, InclusionProof, State};
use tracing::info;

use crate::handler::PacketHandler;
use crate::trust::{get_record, trusted_root, validate_chain_id};
use crate::types::Packet;
use crate::IBC_NAMESPACE;

pub fn egress_counter_key(src: &str, dst: &str) -> Vec<u8> {
    join_key(&[IBC_NAMESPACE.as_bytes(), b"egress", src.as_bytes(), dst.as_bytes()])
}

pub fn egress_packet_key(src: &str, dst: &str, sequence: u64) -> Vec<u8> {
    join_key(&[
        IBC_NAMESPACE.as_bytes(),
        b"egress",
        src.as_bytes(),
        dst.as_bytes(),
        sequence.to_string().as_bytes(),
    ])
}

pub fn ingress_counter_key(src: &str, dst: &str) -> Vec<u8> {
    join_key(&[IBC_NAMESPACE.as_bytes(), b"ingress", src.as_bytes(), dst.as_bytes()])
}

fn read_counter(state: &dyn State, key: &[u8]) -> AppResult<u64> {
    match state.get(key)? {
        Some(bytes) => u64_from_le_bytes(&bytes)
            .ok_or_else(|| AppError::internal(format!("corrupt counter at {}", to_hex(key)))),
        None => Ok(0),
    }
}

pub fn egress_sequence(state: &dyn State, src: &str, dst: &str) -> AppResult<u64> {
    read_counter(state, &egress_counter_key(src, dst))
}

pub fn ingress_sequence(state: &dyn State, src: &str, dst: &str) -> AppResult<u64> {
    read_counter(state, &ingress_counter_key(src, dst))
}

/// Queue a packet on the local chain. Returns the stored packet with its
/// assigned sequence.
pub fn create_packet(
    state: &mut dyn State,
    local_chain_id: &str,
    src: &str,
    dst: &str,
    packet_type: &str,
    payload: Vec<u8>,
) -> AppResult<Packet> {
    if src != local_chain_id {
        return Err(AppError::invalid_input(format!(
            "packet source {src} is not the local chain {local_chain_id}"
        )));
    }
    validate_chain_id(dst)?;
    if packet_type.is_empty() {
        return Err(AppError::invalid_input("packet type is empty"));
    }

    let sequence = egress_sequence(state, src, dst)?;
    let packet = Packet {
        src_chain_id: src.to_string(),
        dst_chain_id: dst.to_string(),
        sequence,
        packet_type: packet_type.to_string(),
        payload,
    };
    state.set(&egress_packet_key(src, dst, sequence), &packet.encode());
    state.set(&egress_counter_key(src, dst), &(sequence + 1).to_le_bytes());

    info!(src, dst, sequence, packet_type, "packet created");
    Ok(packet)
}

/// Admit a packet sent by `from_chain_id`, proven against the root
/// trusted for that chain at `from_height`. Returns the handler's log.
pub fn post_packet(
    state: &mut dyn State,
    local_chain_id: &str,
    handlers: &[Box<dyn PacketHandler>],
    from_chain_id: &str,
    from_height: BlockHeight,
    packet: &Packet,
    proof: &InclusionProof,
) -> AppResult<String> {
    if packet.dst_chain_id != local_chain_id {
        return Err(AppError::invalid_input(format!(
            "packet destination {} is not the local chain {local_chain_id}",
            packet.dst_chain_id
        )));
    }
    if packet.src_chain_id != from_chain_id {
        return Err(AppError::invalid_input(format!(
            "packet source {} was posted as coming from {from_chain_id}",
            packet.src_chain_id
        )));
    }

    let trusted_height = get_record(state, from_chain_id)?.map(|r| r.height);
    let root = match trusted_height {
        Some(height) if height >= from_height => trusted_root(state, from_chain_id, from_height)?,
        _ => None,
    };
    let Some(root) = root else {
        return Err(AppError::new(
            ErrorKind::NotTrusted,
            format!("no trusted root for {from_chain_id} at height {from_height}"),
        ));
    };

    let key = egress_packet_key(&packet.src_chain_id, &packet.dst_chain_id, packet.sequence);
    if !proof.verify(&root, &key, &packet.encode()) {
        return Err(AppError::new(
            ErrorKind::InvalidProof,
            format!(
                "packet {} from {from_chain_id} is not proven at height {from_height}",
                packet.sequence
            ),
        ));
    }

    let expected = ingress_sequence(state, from_chain_id, local_chain_id)?;
    if packet.sequence != expected {
        let what = if packet.sequence < expected { "replayed" } else { "out of order" };
        return Err(AppError::new(
            ErrorKind::PacketSequence,
            format!("{what} packet: expected sequence {expected}, got {}", packet.sequence),
        ));
    }

    let handler = handlers
        .iter()
        .find(|h| h.packet_type() == packet.packet_type)
        .ok_or_else(|| {
            AppError::new(
                ErrorKind::UnknownPacketType,
                format!("unknown packet type: {}", packet.packet_type),
            )
        })?;

    let mut wrap = CacheWrap::new(state);
    wrap.set(
        &ingress_counter_key(from_chain_id, local_chain_id),
        &(expected + 1).to_le_bytes(),
    );
    let log = handler.handle(&mut wrap, packet)?;
    wrap.commit();

    info!(
        src = from_chain_id,
        sequence = packet.sequence,
        packet_type = %packet.packet_type,
        from_height,
        "packet admitted"
    );
    Ok(log)
}
