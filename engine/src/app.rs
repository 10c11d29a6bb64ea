//! The state-machine driver.
//!
//! [`App`] implements the lifecycle the consensus engine drives:
//!
//! ```text
//! Uninitialized --init_chain--> Ready --begin_block--> BlockOpen
//!      ^                          ^                       | deliver_tx*
//!      |                          |                   end_block
//!      |                          +------commit------ BlockClosed
//! ```
//!
//! Two snapshots sit over the latest committed version of the store:
//! `deliver_state` for authoritative delivery and `check_state` for
//! speculative checks. They share only the immutable committed view.
//! `commit` flushes `deliver_state` into the store and replaces both
//! snapshots wholesale, which discards every speculative write.
//!
//! A failed store commit leaves the root indeterminate. The driver then
//! enters [`Phase::Halted`], returns [`FatalError`], and refuses every
//! further call; the host must stop the process.

use hubchain_primitives::types::to_hex;
use hubchain_primitives::{
    apply_writes, AppError, AppResult, BlockHeader, BlockHeight, CacheWrap, CommitStore, Decode,
    ErrorKind, FatalError, Hash, InclusionProof, Snapshot, State, Validator,
};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::ledger::{self, Account};
use crate::options::{AppOption, CoreOption, GenesisOptions};
use crate::plugin::{CallContext, PluginRegistry, TxOutcome};
use crate::transaction::Tx;
use crate::validation::{check_size, validate_basic};

/// Status string returned by a successful `set_option`.
pub const OPTION_SUCCESS: &str = "Success";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    BlockOpen,
    BlockClosed,
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoResponse {
    pub data: String,
    pub version: String,
    pub last_height: BlockHeight,
    pub last_app_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub path: String,
    pub data: Vec<u8>,
    pub prove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub proof: Option<InclusionProof>,
    pub height: BlockHeight,
}

impl QueryResponse {
    /// Decode the value as an [`Account`], if present.
    pub fn account(&self) -> AppResult<Option<Account>> {
        self.value
            .as_deref()
            .map(Account::decode)
            .transpose()
            .map_err(AppError::from)
    }
}

pub struct App {
    store: Box<dyn CommitStore>,
    registry: PluginRegistry,
    config: AppConfig,
    deliver_state: Snapshot,
    check_state: Snapshot,
    phase: Phase,
    /// Height of the open (or last opened) block.
    height: BlockHeight,
}

impl App {
    pub fn new(store: Box<dyn CommitStore>, registry: PluginRegistry, config: AppConfig) -> Self {
        let latest = store.latest();
        info!(
            app = %config.app_name,
            plugins = ?registry.names(),
            height = store.version(),
            "app constructed"
        );
        Self {
            height: store.version(),
            deliver_state: Snapshot::new(latest.clone()),
            check_state: Snapshot::new(latest),
            store,
            registry,
            config,
            phase: Phase::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn last_height(&self) -> BlockHeight {
        self.store.version()
    }

    pub fn info(&self) -> InfoResponse {
        InfoResponse {
            data: format!("{} v{}", self.config.app_name, self.config.version),
            version: self.config.version.clone(),
            last_height: self.store.version(),
            last_app_hash: self.store.root_hash(),
        }
    }

    /// Apply a namespaced option. Returns `"Success"` or the error log.
    pub fn set_option(&mut self, key: &str, value: &str) -> String {
        match AppOption::parse(key, value).and_then(|option| self.apply_option(option)) {
            Ok(status) => status,
            Err(err) => {
                warn!(key, kind = %err.kind, log = %err.log, "set_option rejected");
                err.log
            }
        }
    }

    /// Apply a typed option to both snapshots.
    pub fn apply_option(&mut self, option: AppOption) -> AppResult<String> {
        self.ensure_not_halted()?;
        self.mirrored(|state, registry| match option {
            AppOption::Core(CoreOption::ChainId(chain_id)) => {
                info!(chain_id = %chain_id, "chain id set");
                ledger::set_chain_id(state, &chain_id);
                Ok(OPTION_SUCCESS.to_string())
            }
            AppOption::Core(CoreOption::Account(genesis)) => {
                let address = genesis.address()?;
                let balance = genesis.balance()?;
                info!(address = %to_hex(&address), balance = %balance, "account provisioned");
                let account = Account { sequence: 0, balance };
                ledger::set_account(state, &address, &account);
                Ok(OPTION_SUCCESS.to_string())
            }
            AppOption::Plugin { name, key, value } => {
                debug!(plugin = %name, key = %key, "forwarding option");
                registry.set_option(state, &name, &key, &value)
            }
        })
    }

    /// Set the chain id and apply every genesis option in document order.
    /// Stops at the first failing option.
    pub fn apply_genesis(&mut self, genesis: &GenesisOptions) -> AppResult<()> {
        self.apply_option(AppOption::Core(CoreOption::ChainId(genesis.chain_id.clone())))?;
        for (key, value) in genesis.options() {
            AppOption::parse(key, &value)
                .and_then(|option| self.apply_option(option))
                .map_err(|err| err.prepend_log(&format!("genesis option {key}")))?;
        }
        Ok(())
    }

    /// Speculative execution against the check snapshot.
    pub fn check_tx(&mut self, tx_bytes: &[u8]) -> AppResult<TxOutcome> {
        self.ensure_not_halted()?;
        let height = self.store.version() + 1;
        let result = execute(
            &mut self.check_state,
            &self.registry,
            &self.config,
            tx_bytes,
            height,
            true,
        );
        report("check_tx", result)
    }

    /// Authoritative execution against the deliver snapshot. Only valid
    /// while a block is open.
    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> AppResult<TxOutcome> {
        self.expect_phase(&[Phase::BlockOpen], "deliver_tx")?;
        let result = execute(
            &mut self.deliver_state,
            &self.registry,
            &self.config,
            tx_bytes,
            self.height,
            false,
        );
        report("deliver_tx", result)
    }

    /// Read committed state. Never observes uncommitted writes.
    pub fn query(&self, request: &QueryRequest) -> AppResult<QueryResponse> {
        if request.data.is_empty() {
            return Err(AppError::encoding("query cannot be empty"));
        }
        let key = match request.path.as_str() {
            "/account" => {
                let address: [u8; 32] = request.data.as_slice().try_into().map_err(|_| {
                    AppError::encoding(format!(
                        "account query needs a 32-byte address, got {} bytes",
                        request.data.len()
                    ))
                })?;
                ledger::account_key(&address)
            }
            "/key" => request.data.clone(),
            other => {
                return Err(AppError::new(
                    ErrorKind::UnknownRequest,
                    format!("unexpected query path: {other}"),
                ));
            }
        };
        let out = self.store.query(&key, request.prove)?;
        Ok(QueryResponse {
            key: out.key,
            value: out.value,
            proof: out.proof,
            height: out.height,
        })
    }

    pub fn init_chain(&mut self, validators: &[Validator]) -> AppResult<()> {
        self.expect_phase(&[Phase::Uninitialized], "init_chain")?;
        self.mirrored(|state, registry| {
            registry.init_chain(state, validators);
            Ok(())
        })?;
        info!(validators = validators.len(), "chain initialized");
        self.phase = Phase::Ready;
        Ok(())
    }

    pub fn begin_block(&mut self, hash: &Hash, header: &BlockHeader) -> AppResult<()> {
        self.expect_phase(&[Phase::Ready], "begin_block")?;
        self.height = header.height;
        self.registry.begin_block(&mut self.deliver_state, hash, header);
        debug!(height = header.height, hash = %to_hex(hash), "block opened");
        self.phase = Phase::BlockOpen;
        Ok(())
    }

    /// Close the block and collect validator diffs from every plugin.
    pub fn end_block(&mut self, height: BlockHeight) -> AppResult<Vec<Validator>> {
        self.expect_phase(&[Phase::BlockOpen], "end_block")?;
        if height != self.height {
            warn!(expected = self.height, got = height, "end_block height differs from begin_block");
        }
        let diffs = self.registry.end_block(&mut self.deliver_state, height);
        debug!(height, diffs = diffs.len(), "block closed");
        self.phase = Phase::BlockClosed;
        Ok(diffs)
    }

    /// Persist the delivered writes and rebuild both snapshots over the new
    /// version.
    pub fn commit(&mut self) -> Result<Hash, FatalError> {
        if self.phase == Phase::Halted {
            return Err(FatalError::Halted);
        }
        if self.phase == Phase::BlockOpen {
            warn!(height = self.height, "commit refused while block is still open");
            return Err(FatalError::OutOfPhase(format!("{:?}", self.phase)));
        }

        let stale = Snapshot::new(self.store.latest());
        let writes = std::mem::replace(&mut self.deliver_state, stale).into_writes();
        let pending = writes.len();

        match self.store.commit(writes) {
            Ok(root) => {
                let latest = self.store.latest();
                self.deliver_state = Snapshot::new(latest.clone());
                self.check_state = Snapshot::new(latest);
                if self.phase != Phase::Uninitialized {
                    self.phase = Phase::Ready;
                }
                info!(
                    height = self.store.version(),
                    root = %to_hex(&root),
                    writes = pending,
                    "committed"
                );
                Ok(root)
            }
            Err(err) => {
                error!(error = %err, "persistent commit failed, halting");
                self.phase = Phase::Halted;
                Err(FatalError::Commit(err))
            }
        }
    }

    /// Run `f` in a cache-wrap over the deliver snapshot and replay its
    /// writes into both snapshots, so configuration is visible to checks
    /// before the next commit.
    fn mirrored<T>(
        &mut self,
        f: impl FnOnce(&mut dyn State, &PluginRegistry) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut wrap = CacheWrap::new(&mut self.deliver_state);
        let out = f(&mut wrap, &self.registry)?;
        let writes = wrap.into_writes();
        apply_writes(&mut self.deliver_state, &writes);
        apply_writes(&mut self.check_state, &writes);
        Ok(out)
    }

    fn ensure_not_halted(&self) -> AppResult<()> {
        if self.phase == Phase::Halted {
            return Err(AppError::new(ErrorKind::Lifecycle, "application halted"));
        }
        Ok(())
    }

    fn expect_phase(&self, allowed: &[Phase], call: &str) -> AppResult<()> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        Err(AppError::new(
            ErrorKind::Lifecycle,
            format!("{call} not allowed in phase {:?}", self.phase),
        ))
    }
}

/// Transaction intake shared by both paths. Every effect runs inside a
/// cache-wrap over `state` and is merged only on success.
fn execute(
    state: &mut dyn State,
    registry: &PluginRegistry,
    config: &AppConfig,
    tx_bytes: &[u8],
    height: BlockHeight,
    is_simulation: bool,
) -> AppResult<TxOutcome> {
    check_size(tx_bytes, config.max_tx_size)?;
    let tx = Tx::decode(tx_bytes)?;
    validate_basic(&tx)?;

    let mut wrap = CacheWrap::new(state);
    let chain_id = ledger::chain_id(&wrap)?;
    let outcome = match &tx {
        Tx::Send(send) => {
            ledger::apply_send(&mut wrap, &chain_id, send)?;
            TxOutcome::default()
        }
        Tx::App(app) => {
            registry.get(&app.name)?;
            let caller = ledger::apply_app_input(&mut wrap, &chain_id, app)?;
            let ctx = CallContext {
                chain_id,
                caller,
                height,
            };
            registry.run_tx(&mut wrap, &app.name, &ctx, &app.payload, is_simulation)?
        }
    };
    wrap.commit();
    Ok(outcome)
}

fn report(path: &str, result: AppResult<TxOutcome>) -> AppResult<TxOutcome> {
    result.map_err(|err| {
        debug!(path, kind = %err.kind, log = %err.log, "tx rejected");
        err.prepend_log(path)
    })
}
