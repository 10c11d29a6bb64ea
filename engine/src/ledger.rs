//! Account ledger: address-keyed balances and sequence counters.
//!
//! All ledger keys live under the reserved `core` namespace, which no
//! plugin may register, so plugin state can never collide with accounts.
//!
//! [`credit`] and [`debit`] are the only balance mutators. The transaction
//! entry points run their checks in a fixed order (account exists,
//! signature and address, sequence, funds) and apply every effect inside a
//! [`CacheWrap`], so a rejection leaves the caller's state untouched. The
//! same code serves speculative and authoritative execution.

use hubchain_primitives::codec::{CodecError, Decode, Encode, Reader};
use hubchain_primitives::crypto::{address_from_public_key, hash_blake3, verify_ed25519};
use hubchain_primitives::types::{join_key, to_hex};
use hubchain_primitives::{Address, AppError, AppResult, CacheWrap, ErrorKind, State};
use tracing::debug;

use crate::coins::Coins;
use crate::transaction::{AppTx, SendTx, TxInput};

/// Namespace reserved for the ledger.
pub const CORE_NAMESPACE: &str = "core";

const CHAIN_ID_KEY: &[u8] = b"core/chain_id";

/// Persisted per-address record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub sequence: u64,
    pub balance: Coins,
}

impl Encode for Account {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.sequence.encode_to(buf);
        self.balance.encode_to(buf);
    }
}

impl Decode for Account {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            sequence: r.read_u64()?,
            balance: Coins::decode_from(r)?,
        })
    }
}

/// `core/account/<address>`
pub fn account_key(address: &Address) -> Vec<u8> {
    join_key(&[CORE_NAMESPACE.as_bytes(), b"account", address])
}

/// Account that receives transaction fees. No key controls it.
pub fn fee_collector() -> Address {
    hash_blake3(b"hubchain/fee_collector")
}

pub fn chain_id(state: &dyn State) -> AppResult<String> {
    match state.get(CHAIN_ID_KEY)? {
        Some(bytes) => String::from_utf8(bytes)
            .map_err(|_| AppError::internal("stored chain id is not UTF-8")),
        None => Ok(String::new()),
    }
}

pub fn set_chain_id(state: &mut dyn State, chain_id: &str) {
    state.set(CHAIN_ID_KEY, chain_id.as_bytes());
}

pub fn get_account(state: &dyn State, address: &Address) -> AppResult<Option<Account>> {
    match state.get(&account_key(address))? {
        Some(bytes) => Account::decode(&bytes)
            .map(Some)
            .map_err(|e| AppError::internal(format!("corrupt account {}: {e}", to_hex(address)))),
        None => Ok(None),
    }
}

pub fn set_account(state: &mut dyn State, address: &Address, account: &Account) {
    state.set(&account_key(address), &account.encode());
}

/// Add `coins` to `address`, creating the account if needed.
pub fn credit(state: &mut dyn State, address: &Address, coins: &Coins) -> AppResult<()> {
    if coins.is_zero() {
        return Ok(());
    }
    let mut account = get_account(state, address)?.unwrap_or_default();
    account.balance = account
        .balance
        .checked_add(coins)
        .ok_or_else(|| AppError::invalid_input("balance overflow"))?;
    set_account(state, address, &account);
    Ok(())
}

/// Remove `coins` from `address`. Fails without writing if any
/// denomination would go negative.
pub fn debit(state: &mut dyn State, address: &Address, coins: &Coins) -> AppResult<()> {
    let mut account = get_account(state, address)?
        .ok_or_else(|| unknown_account(address))?;
    account.balance = account.balance.checked_sub(coins).ok_or_else(|| {
        AppError::insufficient_funds(format!("have {}, need {}", account.balance, coins))
    })?;
    set_account(state, address, &account);
    Ok(())
}

/// Validate and apply a core transfer.
///
/// Debits `sum(outputs) + fee` from the input, credits every output, and
/// credits the fee to [`fee_collector`].
pub fn apply_send(state: &mut dyn State, chain_id: &str, tx: &SendTx) -> AppResult<()> {
    let mut total = Coins::new();
    for output in &tx.outputs {
        total = total
            .checked_add(&output.coins)
            .ok_or_else(|| AppError::invalid_input("output total overflows"))?;
    }
    let fee = Coins::single(tx.fee.clone());
    let required = total
        .checked_add(&fee)
        .ok_or_else(|| AppError::invalid_input("output total overflows"))?;

    let mut wrap = CacheWrap::new(state);
    let account = check_input(&wrap, &tx.input, &tx.sign_bytes(chain_id), &required)?;
    consume_input(&mut wrap, &tx.input.address, account, &required);
    for output in &tx.outputs {
        credit(&mut wrap, &output.address, &output.coins)?;
    }
    credit(&mut wrap, &fee_collector(), &fee)?;
    wrap.commit();

    debug!(
        from = %to_hex(&tx.input.address),
        outputs = tx.outputs.len(),
        amount = %total,
        "transfer applied"
    );
    Ok(())
}

/// Validate the input of a plugin call, charge its fee, and advance the
/// sequence. Returns the caller address.
pub fn apply_app_input(state: &mut dyn State, chain_id: &str, tx: &AppTx) -> AppResult<Address> {
    let fee = Coins::single(tx.fee.clone());
    let mut wrap = CacheWrap::new(state);
    let account = check_input(&wrap, &tx.input, &tx.sign_bytes(chain_id), &fee)?;
    consume_input(&mut wrap, &tx.input.address, account, &fee);
    credit(&mut wrap, &fee_collector(), &fee)?;
    wrap.commit();
    Ok(tx.input.address)
}

/// Ordered input checks. Reads only.
fn check_input(
    state: &dyn State,
    input: &TxInput,
    sign_bytes: &[u8],
    required: &Coins,
) -> AppResult<Account> {
    let account = get_account(state, &input.address)?
        .ok_or_else(|| unknown_account(&input.address))?;

    if address_from_public_key(&input.public_key) != input.address {
        return Err(AppError::unauthorized("address does not match public key"));
    }
    if !verify_ed25519(sign_bytes, &input.signature, &input.public_key) {
        return Err(AppError::unauthorized("invalid signature"));
    }

    if input.sequence != account.sequence {
        return Err(AppError::bad_sequence(account.sequence, input.sequence));
    }

    if !account.balance.covers(required) {
        return Err(AppError::insufficient_funds(format!(
            "have {}, need {}",
            account.balance, required
        )));
    }
    Ok(account)
}

/// Debit a checked input and bump its sequence in one write.
fn consume_input(state: &mut dyn State, address: &Address, mut account: Account, amount: &Coins) {
    if let Some(rest) = account.balance.checked_sub(amount) {
        account.balance = rest;
    }
    account.sequence += 1;
    set_account(state, address, &account);
}

fn unknown_account(address: &Address) -> AppError {
    AppError::new(
        ErrorKind::UnknownAccount,
        format!("unknown account {}", to_hex(address)),
    )
}
