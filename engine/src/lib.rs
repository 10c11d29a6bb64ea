//! `hubchain-engine`: the application state machine.
//!
//! This crate turns consensus lifecycle calls into state transitions over
//! the dual-state overlay from `hubchain-primitives`.
//!
//! ## Architecture
//!
//! - [`coins`]: normalized multi-denomination balances
//! - [`ledger`]: accounts, sequences, and the core transfer semantics
//! - [`transaction`]: wire types, encoding, and signing
//! - [`validation`]: size and structure checks before any state access
//! - [`plugin`]: the [`Plugin`] trait and the [`PluginRegistry`]
//! - [`options`]: typed options and genesis options
//! - [`config`]: [`AppConfig`]
//! - [`app`]: the [`App`] driver

pub mod coins;
pub mod ledger;
pub mod transaction;
pub mod validation;
pub mod plugin;
pub mod options;
pub mod config;
pub mod app;

pub use app::{App, InfoResponse, Phase, QueryRequest, QueryResponse, OPTION_SUCCESS};
pub use coins::{Coin, Coins};
pub use config::AppConfig;
pub use ledger::{Account, CORE_NAMESPACE};
pub use options::{AppOption, CoreOption, GenesisAccount, GenesisOptions};
pub use plugin::{route, CallContext, Plugin, PluginRegistry, TxOutcome};
pub use transaction::{AppTx, SendTx, Tx, TxInput, TxOutput};
