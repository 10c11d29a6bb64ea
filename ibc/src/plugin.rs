//! The `ibc` plugin: decodes [`IbcTx`] payloads and dispatches them to the
//! trust tracker and the packet protocol.

use hubchain_engine::{CallContext, Plugin, TxOutcome};
use hubchain_primitives::{AppError, AppResult, CacheWrap, Decode, State};
use tracing::debug;

use crate::handler::{CoinHandler, PacketHandler};
use crate::packet::{create_packet, post_packet};
use crate::trust::{register_chain, update_chain};
use crate::types::{ChainGenesis, IbcTx};
use crate::IBC_NAMESPACE;

/// Option key that registers a foreign chain from a genesis document.
pub const REGISTER_OPTION: &str = "register";

pub struct IbcPlugin {
    handlers: Vec<Box<dyn PacketHandler>>,
}

impl Default for IbcPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl IbcPlugin {
    /// Plugin with the built-in `coin` handler.
    pub fn new() -> Self {
        Self {
            handlers: vec![Box::new(CoinHandler)],
        }
    }

    /// Add a handler. A handler for an already handled type replaces it.
    pub fn with_handler(mut self, handler: Box<dyn PacketHandler>) -> Self {
        self.handlers
            .retain(|h| h.packet_type() != handler.packet_type());
        self.handlers.push(handler);
        self
    }

    pub fn packet_types(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.packet_type()).collect()
    }

    fn handler(&self, packet_type: &str) -> Option<&dyn PacketHandler> {
        self.handlers
            .iter()
            .find(|h| h.packet_type() == packet_type)
            .map(|h| h.as_ref())
    }
}

impl Plugin for IbcPlugin {
    fn name(&self) -> &str {
        IBC_NAMESPACE
    }

    fn set_option(&self, state: &mut dyn State, key: &str, value: &str) -> AppResult<String> {
        match key {
            REGISTER_OPTION => {
                let genesis = ChainGenesis::parse(value)?;
                let record = register_chain(state, &genesis.chain_id, value)?;
                Ok(format!("registered {}", record.chain_id))
            }
            other => Err(AppError::invalid_input(format!("unknown ibc option: {other}"))),
        }
    }

    fn run_tx(
        &self,
        state: &mut dyn State,
        ctx: &CallContext,
        payload: &[u8],
        is_simulation: bool,
    ) -> AppResult<TxOutcome> {
        let tx = IbcTx::decode(payload)?;
        debug!(kind = tx.kind(), height = ctx.height, is_simulation, "ibc tx");

        match tx {
            IbcTx::RegisterChain { chain_id, genesis } => {
                let record = register_chain(state, &chain_id, &genesis)?;
                Ok(TxOutcome::with_log(format!(
                    "registered {} with {} validators",
                    record.chain_id,
                    record.validators.len()
                )))
            }
            IbcTx::UpdateChain { header, commit } => {
                let record = update_chain(state, &header, &commit)?;
                Ok(TxOutcome {
                    data: record.height.to_le_bytes().to_vec(),
                    log: format!("{} trusted at height {}", record.chain_id, record.height),
                })
            }
            IbcTx::CreatePacket {
                src_chain_id,
                dst_chain_id,
                packet_type,
                payload,
            } => {
                let mut wrap = CacheWrap::new(state);
                let packet = create_packet(
                    &mut wrap,
                    &ctx.chain_id,
                    &src_chain_id,
                    &dst_chain_id,
                    &packet_type,
                    payload,
                )?;
                if let Some(handler) = self.handler(&packet.packet_type) {
                    handler.on_send(&mut wrap, &ctx.caller, &packet)?;
                }
                wrap.commit();
                Ok(TxOutcome {
                    data: packet.sequence.to_le_bytes().to_vec(),
                    log: format!(
                        "packet {} queued for {}",
                        packet.sequence, packet.dst_chain_id
                    ),
                })
            }
            IbcTx::PostPacket {
                from_chain_id,
                from_height,
                packet,
                proof,
            } => {
                let log = post_packet(
                    state,
                    &ctx.chain_id,
                    &self.handlers,
                    &from_chain_id,
                    from_height,
                    &packet,
                    &proof,
                )?;
                Ok(TxOutcome {
                    data: packet.sequence.to_le_bytes().to_vec(),
                    log,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{escrow_address, CoinPacket};
    use crate::packet::{egress_packet_key, egress_sequence};
    use crate::trust::get_record;
    use crate::types::Packet;
    use hubchain_engine::ledger::{credit, get_account};
    use hubchain_engine::{Coin, Coins};
    use hubchain_primitives::{Encode, ErrorKind, MerkleTree, Snapshot};
    use std::sync::Arc;

    struct Echo;

    impl PacketHandler for Echo {
        fn packet_type(&self) -> &str {
            "coin"
        }

        fn handle(&self, _state: &mut dyn State, packet: &Packet) -> AppResult<String> {
            Ok(format!("echo {}", packet.sequence))
        }
    }

    fn ctx() -> CallContext {
        CallContext {
            chain_id: "beta".into(),
            caller: [1; 32],
            height: 5,
        }
    }

    fn genesis() -> String {
        serde_json::json!({
            "chain_id": "alpha",
            "app_hash": hex::encode([0u8; 32]),
            "validators": [{ "public_key": hex::encode([7u8; 32]), "power": 1 }]
        })
        .to_string()
    }

    #[test]
    fn test_with_handler_replaces_same_type() {
        let plugin = IbcPlugin::new().with_handler(Box::new(Echo));
        assert_eq!(plugin.packet_types(), vec!["coin"]);
    }

    #[test]
    fn test_register_option() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        let plugin = IbcPlugin::new();
        let status = plugin.set_option(&mut state, REGISTER_OPTION, &genesis()).unwrap();
        assert_eq!(status, "registered alpha");
        assert!(get_record(&state, "alpha").unwrap().is_some());

        let err = plugin.set_option(&mut state, REGISTER_OPTION, &genesis()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChainAlreadyRegistered);
    }

    #[test]
    fn test_unknown_option() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        let err = IbcPlugin::new().set_option(&mut state, "bogus", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_malformed_payload() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        let err = IbcPlugin::new().run_tx(&mut state, &ctx(), &[0xFF], false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EncodingError);
    }

    #[test]
    fn test_create_packet_uses_context_chain() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        let tx = IbcTx::CreatePacket {
            src_chain_id: "beta".into(),
            dst_chain_id: "alpha".into(),
            packet_type: "note".into(),
            payload: vec![],
        };
        let out = IbcPlugin::new().run_tx(&mut state, &ctx(), &tx.encode(), false).unwrap();
        assert_eq!(out.data, 0u64.to_le_bytes().to_vec());

        let foreign = IbcTx::CreatePacket {
            src_chain_id: "alpha".into(),
            dst_chain_id: "beta".into(),
            packet_type: "note".into(),
            payload: vec![],
        };
        assert!(IbcPlugin::new().run_tx(&mut state, &ctx(), &foreign.encode(), false).is_err());
    }

    fn coin_tx(amount: u64) -> IbcTx {
        IbcTx::CreatePacket {
            src_chain_id: "beta".into(),
            dst_chain_id: "alpha".into(),
            packet_type: "coin".into(),
            payload: CoinPacket {
                recipient: [4; 32],
                coins: Coins::single(Coin::new("atom", amount)),
            }
            .encode(),
        }
    }

    #[test]
    fn test_coin_packet_escrows_caller_funds() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        credit(&mut state, &[1; 32], &Coins::single(Coin::new("atom", 100))).unwrap();
        IbcPlugin::new().run_tx(&mut state, &ctx(), &coin_tx(40).encode(), false).unwrap();

        let caller = get_account(&state, &[1; 32]).unwrap().unwrap();
        assert_eq!(caller.balance.amount_of("atom"), 60);
        let escrow = get_account(&state, &escrow_address("alpha")).unwrap().unwrap();
        assert_eq!(escrow.balance.amount_of("atom"), 40);
        assert_eq!(egress_sequence(&state, "beta", "alpha").unwrap(), 1);
    }

    #[test]
    fn test_unfunded_coin_packet_not_queued() {
        let mut state = Snapshot::new(Arc::new(MerkleTree::new()));
        credit(&mut state, &[1; 32], &Coins::single(Coin::new("atom", 10))).unwrap();
        let err = IbcPlugin::new()
            .run_tx(&mut state, &ctx(), &coin_tx(11).encode(), false)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InsufficientFunds);
        assert_eq!(egress_sequence(&state, "beta", "alpha").unwrap(), 0);
        assert!(state.get(&egress_packet_key("beta", "alpha", 0)).unwrap().is_none());
    }
}
