//! Foreign-chain trust tracking.
//!
//! One [`TrustRecord`] per registered chain, stored at `ibc/chain/<id>`.
//! The state root trusted at each accepted height is kept separately at
//! `ibc/chain/<id>/root/<height>` so packets can be proven against any
//! height the chain has passed through, not only the latest.
//!
//! Trust only advances through [`update_chain`]: the header must link to
//! the trusted header hash, increase the height, name the trusted
//! validator set, and carry signatures from more than two thirds of that
//! set's voting power.

use std::collections::BTreeSet;

use hubchain_primitives::codec::{CodecError, Decode, Encode, Reader};
use hubchain_primitives::crypto::verify_ed25519;
use hubchain_primitives::types::{join_key, to_hex};
use hubchain_primitives::{AppError, AppResult, BlockHeight, ErrorKind, Hash, State, ValidatorSet};
use tracing::info;

use crate::types::{vote_sign_bytes, ChainGenesis, Commit, Header};
use crate::IBC_NAMESPACE;

/// What the local chain believes about a foreign chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRecord {
    pub chain_id: String,
    pub height: BlockHeight,
    pub header_hash: Hash,
    pub app_hash: Hash,
    pub validators: ValidatorSet,
}

impl Encode for TrustRecord {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.chain_id.encode_to(buf);
        self.height.encode_to(buf);
        self.header_hash.encode_to(buf);
        self.app_hash.encode_to(buf);
        self.validators.encode_to(buf);
    }
}

impl Decode for TrustRecord {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            chain_id: String::decode_from(r)?,
            height: r.read_u64()?,
            header_hash: r.read_array()?,
            app_hash: r.read_array()?,
            validators: ValidatorSet::decode_from(r)?,
        })
    }
}

pub fn chain_key(chain_id: &str) -> Vec<u8> {
    join_key(&[IBC_NAMESPACE.as_bytes(), b"chain", chain_id.as_bytes()])
}

pub fn root_key(chain_id: &str, height: BlockHeight) -> Vec<u8> {
    join_key(&[
        IBC_NAMESPACE.as_bytes(),
        b"chain",
        chain_id.as_bytes(),
        b"root",
        height.to_string().as_bytes(),
    ])
}

/// Chain ids become key segments, so they may not contain the separator.
pub fn validate_chain_id(chain_id: &str) -> AppResult<()> {
    if chain_id.is_empty() || chain_id.contains('/') {
        return Err(AppError::invalid_input(format!("invalid chain id: {chain_id:?}")));
    }
    Ok(())
}

pub fn get_record(state: &dyn State, chain_id: &str) -> AppResult<Option<TrustRecord>> {
    state
        .get(&chain_key(chain_id))?
        .map(|bytes| TrustRecord::decode(&bytes))
        .transpose()
        .map_err(|e| AppError::internal(format!("corrupt trust record for {chain_id}: {e}")))
}

/// State root trusted for `chain_id` at exactly `height`.
pub fn trusted_root(state: &dyn State, chain_id: &str, height: BlockHeight) -> AppResult<Option<Hash>> {
    match state.get(&root_key(chain_id, height))? {
        Some(bytes) => {
            let root: Hash = bytes
                .try_into()
                .map_err(|_| AppError::internal("corrupt trusted root"))?;
            Ok(Some(root))
        }
        None => Ok(None),
    }
}

fn store_record(state: &mut dyn State, record: &TrustRecord) {
    state.set(&chain_key(&record.chain_id), &record.encode());
    state.set(&root_key(&record.chain_id, record.height), &record.app_hash);
}

/// Start trusting a chain from its genesis document.
pub fn register_chain(state: &mut dyn State, chain_id: &str, document: &str) -> AppResult<TrustRecord> {
    validate_chain_id(chain_id)?;
    let genesis = ChainGenesis::parse(document)?;
    if genesis.chain_id != chain_id {
        return Err(AppError::invalid_input(format!(
            "genesis is for chain {}, not {chain_id}",
            genesis.chain_id
        )));
    }
    if get_record(state, chain_id)?.is_some() {
        return Err(AppError::new(
            ErrorKind::ChainAlreadyRegistered,
            format!("chain already registered: {chain_id}"),
        ));
    }

    let record = TrustRecord {
        chain_id: genesis.chain_id,
        height: 0,
        header_hash: genesis.genesis_hash,
        app_hash: genesis.app_hash,
        validators: genesis.validators,
    };
    store_record(state, &record);
    info!(
        chain_id,
        validators = record.validators.len(),
        genesis_hash = %to_hex(&record.header_hash),
        "foreign chain registered"
    );
    Ok(record)
}

/// Advance trust in a registered chain by one verified header.
pub fn update_chain(state: &mut dyn State, header: &Header, commit: &Commit) -> AppResult<TrustRecord> {
    let chain_id = header.chain_id.as_str();
    let record = get_record(state, chain_id)?.ok_or_else(|| {
        AppError::new(
            ErrorKind::ChainNotRegistered,
            format!("chain not registered: {chain_id}"),
        )
    })?;

    if header.height <= record.height {
        return Err(invalid_header(format!(
            "height {} is not above trusted height {}",
            header.height, record.height
        )));
    }
    if header.last_block_hash != record.header_hash {
        return Err(invalid_header(format!(
            "header links to {}, trusted header is {}",
            to_hex(&header.last_block_hash),
            to_hex(&record.header_hash)
        )));
    }
    if header.validators_hash != record.validators.hash() {
        return Err(invalid_header("header is not signed by the trusted validator set"));
    }

    let header_hash = header.hash();
    verify_commit(&record.validators, chain_id, header.height, &header_hash, commit)?;

    let validators = if header.next_validators.is_empty() {
        record.validators
    } else {
        let next = ValidatorSet::new(header.next_validators.clone());
        if next.total_power() == 0 {
            return Err(invalid_header("next validator set has no voting power"));
        }
        next
    };

    let updated = TrustRecord {
        chain_id: record.chain_id,
        height: header.height,
        header_hash,
        app_hash: header.app_hash,
        validators,
    };
    store_record(state, &updated);
    info!(
        chain_id,
        height = updated.height,
        app_hash = %to_hex(&updated.app_hash),
        rotated = !header.next_validators.is_empty(),
        "foreign chain advanced"
    );
    Ok(updated)
}

/// Check that more than two thirds of `validators` by power signed the
/// vote for `header_hash`. Unknown, duplicate, and invalid signatures add
/// nothing.
pub fn verify_commit(
    validators: &ValidatorSet,
    chain_id: &str,
    height: BlockHeight,
    header_hash: &Hash,
    commit: &Commit,
) -> AppResult<()> {
    let message = vote_sign_bytes(chain_id, height, header_hash);
    let mut seen = BTreeSet::new();
    let mut signed: u128 = 0;

    for sig in &commit.signatures {
        if !seen.insert(sig.public_key) {
            continue;
        }
        let Some(power) = validators.power_of(&sig.public_key) else {
            continue;
        };
        if verify_ed25519(&message, &sig.signature, &sig.public_key) {
            signed += u128::from(power);
        }
    }

    let total: u128 = validators
        .validators
        .iter()
        .map(|v| u128::from(v.power))
        .sum();
    if total == 0 || 3 * signed <= 2 * total {
        return Err(invalid_header(format!(
            "insufficient voting power: {signed} of {total}"
        )));
    }
    Ok(())
}

fn invalid_header(log: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::InvalidHeader, log)
}
