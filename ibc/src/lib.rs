//! `hubchain-ibc`: the inter-chain plugin.
//!
//! Tracks trust in foreign chains header by header and relays packets
//! between chains. A packet is admitted only with an inclusion proof
//! against a state root this chain already trusts, and only in sequence.
//!
//! ## Architecture
//!
//! - [`types`]: headers, commits, packets, and the [`IbcTx`] payload
//! - [`trust`]: registration and verified header updates
//! - [`packet`]: egress queues and proven ingress
//! - [`handler`]: per-type packet handlers, including `coin`
//! - [`plugin`]: [`IbcPlugin`], the `Plugin` implementation
//! - [`builder`]: hex-input transaction builders for relayer tooling

pub mod types;
pub mod trust;
pub mod packet;
pub mod handler;
pub mod plugin;
pub mod builder;

/// Plugin name and storage namespace.
pub const IBC_NAMESPACE: &str = "ibc";

pub use builder::TxSigner;
pub use handler::{escrow_address, CoinHandler, CoinPacket, PacketHandler, COIN_PACKET_TYPE};
pub use packet::{create_packet, post_packet};
pub use plugin::IbcPlugin;
pub use trust::{register_chain, update_chain, TrustRecord};
pub use types::{ChainGenesis, Commit, CommitSig, GenesisDoc, Header, IbcTx, Packet};
