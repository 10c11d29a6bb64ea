//! Stateless transaction checks.
//!
//! [`check_size`] runs on raw bytes before any decoding. [`validate_basic`]
//! runs on the decoded transaction before any state is read.

use hubchain_primitives::{AppError, AppResult};

use crate::transaction::Tx;

/// Reject oversize input without looking at its contents.
pub fn check_size(tx_bytes: &[u8], max_tx_size: usize) -> AppResult<()> {
    if tx_bytes.len() > max_tx_size {
        return Err(AppError::encoding("tx size exceeds maximum").append_log(&format!(
            "{} > {}",
            tx_bytes.len(),
            max_tx_size
        )));
    }
    Ok(())
}

/// Structural checks that need no state.
pub fn validate_basic(tx: &Tx) -> AppResult<()> {
    match tx {
        Tx::Send(send) => {
            if send.outputs.is_empty() {
                return Err(AppError::invalid_input("send has no outputs"));
            }
            for (i, output) in send.outputs.iter().enumerate() {
                if output.coins.is_zero() || !output.coins.is_valid() {
                    return Err(AppError::invalid_input(format!(
                        "output {i} coins must be sorted, unique, and positive"
                    )));
                }
            }
        }
        Tx::App(app) => {
            if app.name.is_empty() {
                return Err(AppError::invalid_input("app tx names no plugin"));
            }
        }
    }
    let fee = match tx {
        Tx::Send(send) => &send.fee,
        Tx::App(app) => &app.fee,
    };
    if fee.amount > 0 && fee.denom.is_empty() {
        return Err(AppError::invalid_input("fee has no denomination"));
    }
    Ok(())
}
