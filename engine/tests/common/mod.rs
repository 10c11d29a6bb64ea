//! Shared helpers for the engine integration tests.
//!
//! Provides deterministic keypairs, signed transaction encoding, a counting
//! test plugin, a store that can be told to fail, and an `App` factory with
//! funded genesis accounts.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use hubchain_engine::{
    App, AppConfig, AppTx, CallContext, Coin, Coins, GenesisOptions, Plugin, PluginRegistry,
    QueryRequest, SendTx, Tx, TxInput, TxOutcome, TxOutput,
};
use hubchain_primitives::crypto::address_from_public_key;
use hubchain_primitives::{
    Address, AppError, AppResult, BlockHeader, BlockHeight, CommitStore, Encode, Hash, MemStore,
    QueryOutput, ReadStore, State, StoreError, WriteSet, ZERO_HASH,
};

pub const CHAIN_ID: &str = "hub-test";
pub const DENOM: &str = "atom";

// ── Deterministic Keypairs ──

/// Signing key whose secret is `[seed; 32]`.
pub fn deterministic_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn address_of(seed: u8) -> Address {
    address_from_public_key(&deterministic_key(seed).verifying_key().to_bytes())
}

pub fn public_key_hex(seed: u8) -> String {
    hex::encode(deterministic_key(seed).verifying_key().to_bytes())
}

pub const ALICE: u8 = 1;
pub const BOB: u8 = 2;
pub const CHARLIE: u8 = 3;

// ── Transaction Encoding ──

pub fn atoms(amount: u64) -> Coins {
    Coins::single(Coin::new(DENOM, amount))
}

/// Signed single-output transfer.
pub fn send_tx(from: u8, sequence: u64, to: &Address, amount: u64, fee: u64) -> Vec<u8> {
    let key = deterministic_key(from);
    let mut tx = Tx::Send(SendTx {
        input: TxInput::new(key.verifying_key().to_bytes(), sequence),
        outputs: vec![TxOutput {
            address: *to,
            coins: atoms(amount),
        }],
        fee: Coin::new(DENOM, fee),
    });
    tx.sign(CHAIN_ID, &key);
    tx.encode()
}

/// Signed call into plugin `name`.
pub fn app_tx(from: u8, sequence: u64, name: &str, payload: &[u8], fee: u64) -> Vec<u8> {
    let key = deterministic_key(from);
    let mut tx = Tx::App(AppTx {
        input: TxInput::new(key.verifying_key().to_bytes(), sequence),
        fee: Coin::new(DENOM, fee),
        name: name.to_string(),
        payload: payload.to_vec(),
    });
    tx.sign(CHAIN_ID, &key);
    tx.encode()
}

// ── Test Plugin ──

pub const COUNTER_KEY: &[u8] = b"counter/value";

/// Counts successful calls. Payload `fail` errors after writing, which
/// exercises rollback. Returns the call height as data.
pub struct Counter;

impl Plugin for Counter {
    fn name(&self) -> &str {
        "counter"
    }

    fn set_option(&self, state: &mut dyn State, key: &str, value: &str) -> AppResult<String> {
        if key != "start" {
            return Err(AppError::invalid_input(format!("unknown counter option {key}")));
        }
        let start: u64 = value
            .parse()
            .map_err(|_| AppError::invalid_input("start must be an integer"))?;
        state.set(COUNTER_KEY, &start.to_le_bytes());
        Ok("Success".into())
    }

    fn run_tx(
        &self,
        state: &mut dyn State,
        ctx: &CallContext,
        payload: &[u8],
        _is_simulation: bool,
    ) -> AppResult<TxOutcome> {
        let current = read_counter(state)?;
        state.set(COUNTER_KEY, &(current + 1).to_le_bytes());
        if payload == b"fail" {
            return Err(AppError::invalid_input("counter asked to fail"));
        }
        Ok(TxOutcome {
            data: ctx.height.to_le_bytes().to_vec(),
            log: format!("counter={}", current + 1),
        })
    }
}

pub fn read_counter(state: &dyn State) -> AppResult<u64> {
    Ok(state
        .get(COUNTER_KEY)?
        .and_then(|b| hubchain_primitives::types::u64_from_le_bytes(&b))
        .unwrap_or(0))
}

// ── Stores ──

/// `MemStore` whose next commit fails once `fail` is set.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemStore,
    pub fail: Arc<AtomicBool>,
}

impl CommitStore for FlakyStore {
    fn latest(&self) -> Arc<dyn ReadStore> {
        self.inner.latest()
    }

    fn commit(&mut self, writes: WriteSet) -> Result<Hash, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".into()));
        }
        self.inner.commit(writes)
    }

    fn root_hash(&self) -> Hash {
        self.inner.root_hash()
    }

    fn version(&self) -> BlockHeight {
        self.inner.version()
    }

    fn query(&self, key: &[u8], prove: bool) -> Result<QueryOutput, StoreError> {
        self.inner.query(key, prove)
    }
}

// ── App Factory ──

pub fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register(Box::new(Counter))
        .expect("register counter");
    registry
}

/// Genesis document funding `(seed, atoms)` pairs.
pub fn genesis(accounts: &[(u8, u64)]) -> GenesisOptions {
    let options: Vec<serde_json::Value> = accounts
        .iter()
        .map(|(seed, amount)| {
            serde_json::json!([
                "core/account",
                { "public_key": public_key_hex(*seed), "coins": [{ "denom": DENOM, "amount": amount }] }
            ])
        })
        .collect();
    let doc = serde_json::json!({ "chain_id": CHAIN_ID, "app_options": options });
    GenesisOptions::from_json(&doc.to_string()).expect("genesis json")
}

pub fn app_with_store(store: Box<dyn CommitStore>, accounts: &[(u8, u64)]) -> App {
    app_with(store, accounts, AppConfig::default())
}

pub fn app_with(store: Box<dyn CommitStore>, accounts: &[(u8, u64)], config: AppConfig) -> App {
    let mut app = App::new(store, registry(), config);
    app.apply_genesis(&genesis(accounts)).expect("genesis");
    app.init_chain(&[]).expect("init_chain");
    app
}

/// Initialized app over a `MemStore` with funded accounts, not yet committed.
pub fn funded_app(accounts: &[(u8, u64)]) -> App {
    app_with_store(Box::new(MemStore::new()), accounts)
}

pub fn header(height: BlockHeight) -> BlockHeader {
    BlockHeader {
        chain_id: CHAIN_ID.into(),
        height,
        time: 1_700_000_000 + height,
        last_block_hash: ZERO_HASH,
        app_hash: ZERO_HASH,
        num_txs: 0,
    }
}

/// Run one full block and commit it.
pub fn run_block(app: &mut App, height: BlockHeight, txs: &[Vec<u8>]) -> Vec<AppResult<TxOutcome>> {
    app.begin_block(&[height as u8; 32], &header(height))
        .expect("begin_block");
    let results = txs.iter().map(|tx| app.deliver_tx(tx)).collect();
    app.end_block(height).expect("end_block");
    app.commit().expect("commit");
    results
}

/// Committed balance of `address` in the test denomination.
pub fn committed_balance(app: &App, address: &Address) -> u64 {
    committed_account(app, address).map_or(0, |(_, balance)| balance)
}

pub fn committed_sequence(app: &App, address: &Address) -> u64 {
    committed_account(app, address).map_or(0, |(sequence, _)| sequence)
}

fn committed_account(app: &App, address: &Address) -> Option<(u64, u64)> {
    let out = app
        .query(&QueryRequest {
            path: "/account".into(),
            data: address.to_vec(),
            prove: false,
        })
        .expect("account query");
    out.account()
        .expect("decode account")
        .map(|a| (a.sequence, a.balance.amount_of(DENOM)))
}
