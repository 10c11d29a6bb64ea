//! Typed application options.
//!
//! Option keys are namespaced exactly like transactions: `core/<key>` targets
//! the ledger, `<plugin>/<key>` targets a registered plugin. Parsing produces
//! an [`AppOption`]; the driver applies it.

use hubchain_primitives::crypto::address_from_public_key;
use hubchain_primitives::{Address, AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::coins::{Coin, Coins};
use crate::ledger::CORE_NAMESPACE;
use crate::plugin::route;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOption {
    Core(CoreOption),
    Plugin {
        name: String,
        key: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreOption {
    /// `core/chain_id`
    ChainId(String),
    /// `core/account`, value is a JSON [`GenesisAccount`].
    Account(GenesisAccount),
}

/// Account provisioned by configuration rather than by a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    #[serde(default)]
    pub coins: Vec<Coin>,
}

impl GenesisAccount {
    pub fn public_key_bytes(&self) -> AppResult<[u8; 32]> {
        let bytes = hex::decode(self.public_key.trim_start_matches("0x"))
            .map_err(|e| AppError::invalid_input(format!("public key is not hex: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| AppError::invalid_input("public key must be 32 bytes"))
    }

    pub fn address(&self) -> AppResult<Address> {
        Ok(address_from_public_key(&self.public_key_bytes()?))
    }

    pub fn balance(&self) -> AppResult<Coins> {
        Coins::normalize(self.coins.clone())
            .ok_or_else(|| AppError::invalid_input("genesis balance overflows"))
    }
}

impl AppOption {
    pub fn parse(key: &str, value: &str) -> AppResult<Self> {
        let (name, rest) = route(key);
        if name.is_empty() {
            return Err(AppError::invalid_input(format!("option key has no namespace: {key:?}")));
        }
        if name != CORE_NAMESPACE {
            return Ok(AppOption::Plugin {
                name: name.to_string(),
                key: rest.to_string(),
                value: value.to_string(),
            });
        }
        let core = match rest {
            "chain_id" => CoreOption::ChainId(value.to_string()),
            "account" => {
                let account: GenesisAccount = serde_json::from_str(value)
                    .map_err(|e| AppError::encoding(format!("invalid account option: {e}")))?;
                CoreOption::Account(account)
            }
            other => {
                return Err(AppError::invalid_input(format!("unknown core option: {other}")));
            }
        };
        Ok(AppOption::Core(core))
    }
}

/// Genesis-time options: `{ "chain_id": ..., "app_options": [[key, value], ...] }`.
///
/// Values may be JSON strings or arbitrary JSON; non-string values are
/// passed on in their compact JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenesisOptions {
    pub chain_id: String,
    #[serde(default)]
    pub app_options: Vec<(String, serde_json::Value)>,
}

impl GenesisOptions {
    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| AppError::encoding(format!("invalid genesis options: {e}")))
    }

    /// `(key, value)` pairs in document order with values flattened to strings.
    pub fn options(&self) -> impl Iterator<Item = (&str, String)> {
        self.app_options.iter().map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), value)
        })
    }
}
