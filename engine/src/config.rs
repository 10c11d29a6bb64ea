//! Driver configuration.

use hubchain_primitives::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Largest accepted encoded transaction, in bytes.
pub const DEFAULT_MAX_TX_SIZE: usize = 10_240;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_tx_size: usize,
    pub version: String,
    pub app_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_tx_size: DEFAULT_MAX_TX_SIZE,
            version: "0.1".into(),
            app_name: "hubchain".into(),
        }
    }
}

impl AppConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AppError::encoding(format!("invalid config: {e}")))?;
        if config.max_tx_size == 0 {
            return Err(AppError::invalid_input("max_tx_size must be > 0"));
        }
        Ok(config)
    }
}
