//! Plugin trait and the registry that routes namespaced calls to plugins.
//!
//! The registry is an explicit value built once by the hosting process and
//! handed to [`crate::App::new`]. Registration order is the iteration order
//! for the `init_chain`, `begin_block`, and `end_block` callbacks.

use hubchain_primitives::{
    Address, AppError, AppResult, BlockHeader, BlockHeight, ErrorKind, Hash, State, Validator,
};
use tracing::info;

use crate::ledger::CORE_NAMESPACE;

/// Namespace separator in option keys and routed names.
pub const NAMESPACE_SEPARATOR: char = '/';

/// Who is calling a plugin, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub chain_id: String,
    /// Address of the signed transaction input.
    pub caller: Address,
    /// Height of the block the call executes in. For speculative checks
    /// this is the height of the next block.
    pub height: BlockHeight,
}

/// Successful result of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOutcome {
    pub data: Vec<u8>,
    pub log: String,
}

impl TxOutcome {
    pub fn with_log(log: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            log: log.into(),
        }
    }
}

/// A named extension of the state machine.
///
/// Every callback receives the snapshot of the path it runs on. Plugins
/// keep no state of their own outside of it.
pub trait Plugin: Send + Sync {
    /// Unique name, also the routing namespace.
    fn name(&self) -> &str;

    /// Apply a configuration option and return a status string.
    fn set_option(&self, state: &mut dyn State, key: &str, value: &str) -> AppResult<String>;

    /// Execute a transaction payload. On error the driver discards every
    /// write made by this call.
    fn run_tx(
        &self,
        state: &mut dyn State,
        ctx: &CallContext,
        payload: &[u8],
        is_simulation: bool,
    ) -> AppResult<TxOutcome>;

    fn init_chain(&self, _state: &mut dyn State, _validators: &[Validator]) {}

    fn begin_block(&self, _state: &mut dyn State, _hash: &Hash, _header: &BlockHeader) {}

    /// Validator-set changes this plugin requests at the end of the block.
    fn end_block(&self, _state: &mut dyn State, _height: BlockHeight) -> Vec<Validator> {
        Vec::new()
    }
}

/// Split `key` on the first separator into `(name, rest)`.
///
/// Without a separator the whole key is the name and `rest` is empty.
pub fn route(key: &str) -> (&str, &str) {
    key.split_once(NAMESPACE_SEPARATOR).unwrap_or((key, ""))
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin. Names must be unique, non-empty, free of the
    /// separator, and not the reserved core namespace.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> AppResult<()> {
        let name = plugin.name();
        if name.is_empty() || name.contains(NAMESPACE_SEPARATOR) {
            return Err(AppError::invalid_input(format!("invalid plugin name: {name:?}")));
        }
        if name == CORE_NAMESPACE {
            return Err(AppError::new(
                ErrorKind::DuplicatePlugin,
                format!("plugin name {name} is reserved"),
            ));
        }
        if self.contains(name) {
            return Err(AppError::new(
                ErrorKind::DuplicatePlugin,
                format!("plugin already registered: {name}"),
            ));
        }
        info!(plugin = name, index = self.plugins.len(), "plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, plugin: Box<dyn Plugin>) -> AppResult<Self> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> AppResult<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
            .ok_or_else(|| AppError::unknown_plugin(name))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|p| p.name()).collect()
    }

    /// Forward an option to the plugin `name`. The plugin's own result is
    /// returned unchanged.
    pub fn set_option(
        &self,
        state: &mut dyn State,
        name: &str,
        key: &str,
        value: &str,
    ) -> AppResult<String> {
        self.get(name)?.set_option(state, key, value)
    }

    /// Forward a transaction payload to the plugin `name`.
    pub fn run_tx(
        &self,
        state: &mut dyn State,
        name: &str,
        ctx: &CallContext,
        payload: &[u8],
        is_simulation: bool,
    ) -> AppResult<TxOutcome> {
        self.get(name)?.run_tx(state, ctx, payload, is_simulation)
    }

    pub fn init_chain(&self, state: &mut dyn State, validators: &[Validator]) {
        for plugin in self.iter() {
            plugin.init_chain(state, validators);
        }
    }

    pub fn begin_block(&self, state: &mut dyn State, hash: &Hash, header: &BlockHeader) {
        for plugin in self.iter() {
            plugin.begin_block(state, hash, header);
        }
    }

    /// Concatenated diffs in registration order.
    pub fn end_block(&self, state: &mut dyn State, height: BlockHeight) -> Vec<Validator> {
        self.iter()
            .flat_map(|plugin| plugin.end_block(state, height))
            .collect()
    }
}
