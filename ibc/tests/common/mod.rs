//! Shared helpers for the inter-chain integration tests.
//!
//! Two in-process chains, each an `App` over a `MemStore` with the `ibc`
//! plugin registered, plus a deterministic foreign validator set whose
//! keys sign headers for chain `alpha`.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use hubchain_engine::{App, AppConfig, Coin, Coins, GenesisOptions, PluginRegistry, QueryRequest, TxOutcome};
use hubchain_ibc::packet::egress_packet_key;
use hubchain_ibc::types::vote_sign_bytes;
use hubchain_ibc::{CoinPacket, Commit, CommitSig, Header, IbcPlugin, IbcTx, Packet, TxSigner};
use hubchain_primitives::crypto::{address_from_public_key, hash_sha256, sign_ed25519};
use hubchain_primitives::{
    Address, AppResult, BlockHeader, BlockHeight, Decode, Encode, Hash, InclusionProof, MemStore,
    Validator, ValidatorSet, ZERO_HASH,
};

pub const ALPHA: &str = "alpha";
pub const BETA: &str = "beta";
pub const DENOM: &str = "atom";

pub const RELAYER: u8 = 1;
pub const BOB: u8 = 2;

/// Seeds of alpha's validators, one unit of power each.
pub const ALPHA_VALIDATORS: [u8; 3] = [10, 11, 12];

// ── Deterministic Keypairs ──

pub fn deterministic_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn public_key(seed: u8) -> [u8; 32] {
    deterministic_key(seed).verifying_key().to_bytes()
}

pub fn address_of(seed: u8) -> Address {
    address_from_public_key(&public_key(seed))
}

// ── Chains ──

/// Initialized chain `chain_id` with the relayer funded, not yet committed.
pub fn chain(chain_id: &str) -> App {
    chain_with(chain_id, &[(RELAYER, 1000)])
}

/// Initialized chain `chain_id` with each `(seed, amount)` account funded.
pub fn chain_with(chain_id: &str, accounts: &[(u8, u64)]) -> App {
    let mut registry = PluginRegistry::new();
    registry
        .register(Box::new(IbcPlugin::new()))
        .expect("register ibc");
    let mut app = App::new(Box::new(MemStore::new()), registry, AppConfig::default());

    let app_options: Vec<serde_json::Value> = accounts
        .iter()
        .map(|(seed, amount)| {
            serde_json::json!([
                "core/account",
                { "public_key": hex::encode(public_key(*seed)), "coins": [{ "denom": DENOM, "amount": amount }] }
            ])
        })
        .collect();
    let doc = serde_json::json!({
        "chain_id": chain_id,
        "app_options": app_options,
    });
    let genesis = GenesisOptions::from_json(&doc.to_string()).expect("genesis json");
    app.apply_genesis(&genesis).expect("genesis");
    app.init_chain(&[]).expect("init_chain");
    app
}

fn block_header(height: BlockHeight) -> BlockHeader {
    BlockHeader {
        chain_id: String::new(),
        height,
        time: 1_700_000_000 + height,
        last_block_hash: ZERO_HASH,
        app_hash: ZERO_HASH,
        num_txs: 0,
    }
}

/// Run one block of `txs` at the next height and commit it. Returns the
/// delivery results and the new app hash.
pub fn run_block(app: &mut App, txs: &[Vec<u8>]) -> (Vec<AppResult<TxOutcome>>, Hash) {
    let height = app.last_height() + 1;
    app.begin_block(&[height as u8; 32], &block_header(height))
        .expect("begin_block");
    let results = txs.iter().map(|tx| app.deliver_tx(tx)).collect();
    app.end_block(height).expect("end_block");
    let root = app.commit().expect("commit");
    (results, root)
}

/// Deliver a single transaction in its own block.
pub fn deliver_one(app: &mut App, tx: Vec<u8>) -> (AppResult<TxOutcome>, Hash) {
    let (mut results, root) = run_block(app, &[tx]);
    (results.remove(0), root)
}

pub fn committed_account(app: &App, seed: u8) -> Option<(u64, u64)> {
    committed_account_at(app, &address_of(seed))
}

pub fn committed_account_at(app: &App, address: &Address) -> Option<(u64, u64)> {
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

pub fn committed_balance(app: &App, seed: u8) -> u64 {
    committed_account(app, seed).map_or(0, |(_, balance)| balance)
}

/// Relayer transaction on `chain_id`, signed at the relayer's committed sequence.
pub fn relayer_tx(app: &App, chain_id: &str, tx: &IbcTx) -> Vec<u8> {
    let sequence = committed_account(app, RELAYER).map_or(0, |(sequence, _)| sequence);
    TxSigner::new(chain_id, deterministic_key(RELAYER), sequence, Coin::new(DENOM, 0)).sign(tx)
}

// ── Alpha's Foreign View ──

pub fn alpha_validators() -> ValidatorSet {
    validator_set(&ALPHA_VALIDATORS)
}

pub fn validator_set(seeds: &[u8]) -> ValidatorSet {
    ValidatorSet::new(
        seeds
            .iter()
            .map(|seed| Validator {
                public_key: public_key(*seed),
                power: 1,
            })
            .collect(),
    )
}

/// Genesis document for alpha as registered on beta.
pub fn alpha_genesis_doc() -> String {
    let validators: Vec<serde_json::Value> = ALPHA_VALIDATORS
        .iter()
        .map(|seed| serde_json::json!({ "public_key": hex::encode(public_key(*seed)), "power": 1 }))
        .collect();
    serde_json::json!({
        "chain_id": ALPHA,
        "app_hash": hex::encode(ZERO_HASH),
        "validators": validators,
    })
    .to_string()
}

pub fn alpha_genesis_hash() -> Hash {
    hash_sha256(alpha_genesis_doc().as_bytes())
}

/// Header for `chain_id` at `height` naming the set `validator_seeds`.
pub fn header(
    chain_id: &str,
    height: BlockHeight,
    last_block_hash: Hash,
    app_hash: Hash,
    validator_seeds: &[u8],
) -> Header {
    Header {
        chain_id: chain_id.into(),
        height,
        time: 1_700_000_000 + height,
        last_block_hash,
        app_hash,
        validators_hash: validator_set(validator_seeds).hash(),
        next_validators: Vec::new(),
    }
}

/// Commit over `header` signed by `signer_seeds`.
pub fn sign_header(header: &Header, signer_seeds: &[u8]) -> Commit {
    let message = vote_sign_bytes(&header.chain_id, header.height, &header.hash());
    Commit {
        signatures: signer_seeds
            .iter()
            .map(|seed| CommitSig {
                public_key: public_key(*seed),
                signature: sign_ed25519(&message, &deterministic_key(*seed)),
            })
            .collect(),
    }
}

// ── Packets ──

pub fn coin_payload(recipient: u8, amount: u64) -> Vec<u8> {
    CoinPacket {
        recipient: address_of(recipient),
        coins: Coins::single(Coin::new(DENOM, amount)),
    }
    .encode()
}

/// Packet stored on `app` for the channel, and its proof under the
/// latest committed root.
pub fn prove_packet(app: &App, src: &str, dst: &str, sequence: u64) -> (Packet, InclusionProof) {
    let out = app
        .query(&QueryRequest {
            path: "/key".into(),
            data: egress_packet_key(src, dst, sequence),
            prove: true,
        })
        .expect("packet query");
    let packet = Packet::decode(&out.value.expect("packet stored")).expect("packet bytes");
    (packet, out.proof.expect("packet proof"))
}

/// Register alpha on beta and return beta's trusted view of alpha's header hash.
pub fn register_alpha_on_beta(beta: &mut App) -> Hash {
    let tx = relayer_tx(
        beta,
        BETA,
        &IbcTx::RegisterChain {
            chain_id: ALPHA.into(),
            genesis: alpha_genesis_doc(),
        },
    );
    let (result, _) = deliver_one(beta, tx);
    result.expect("register alpha");
    alpha_genesis_hash()
}

/// Submit an alpha header to beta signed by every alpha validator.
/// Returns the header hash for the next link.
pub fn update_alpha_on_beta(
    beta: &mut App,
    height: BlockHeight,
    last_block_hash: Hash,
    app_hash: Hash,
) -> Hash {
    let header = header(ALPHA, height, last_block_hash, app_hash, &ALPHA_VALIDATORS);
    let commit = sign_header(&header, &ALPHA_VALIDATORS);
    let tx = relayer_tx(beta, BETA, &IbcTx::UpdateChain { header: header.clone(), commit });
    let (result, _) = deliver_one(beta, tx);
    result.expect("update alpha");
    header.hash()
}
