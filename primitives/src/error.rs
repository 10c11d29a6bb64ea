//! Error taxonomy for the hubchain application layer.
//!
//! Every non-fatal rejection is an [`AppError`]: a stable [`ErrorKind`] code
//! plus a human-readable log. Rejections never crash the process and carry
//! no retry semantics. The only unrecoverable condition is a failed commit
//! of the persistent store, reported as [`FatalError`].

use std::fmt;

use crate::store::StoreError;

/// Result codes returned to the consensus engine.
///
/// `0` is reserved for success. The repr values are part of the external
/// interface and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// Oversize or malformed transaction / query bytes.
    EncodingError = 1,
    /// Namespace names no registered plugin.
    UnknownPlugin = 2,
    /// A plugin with the same name is already registered.
    DuplicatePlugin = 3,
    /// Supplied account sequence differs from the stored one.
    BadSequence = 4,
    /// Some denomination would go negative.
    InsufficientFunds = 5,
    /// Sender account does not exist.
    UnknownAccount = 6,
    /// Signature or address/public-key mismatch.
    Unauthorized = 7,
    /// Structurally valid bytes with invalid contents.
    InvalidInput = 8,
    ChainNotRegistered = 9,
    ChainAlreadyRegistered = 10,
    /// Header update failed linkage, monotonicity, or quorum checks.
    InvalidHeader = 11,
    /// No trusted state root for the claimed source height.
    NotTrusted = 12,
    InvalidProof = 13,
    /// Ingress sequence is a replay or out of order.
    PacketSequence = 14,
    UnknownPacketType = 15,
    UnknownRequest = 16,
    /// Lifecycle call arrived in the wrong phase.
    Lifecycle = 17,
    Internal = 18,
}

impl ErrorKind {
    /// Convert from a wire code. `0` (success) and unknown codes return `None`.
    pub fn from_u32(code: u32) -> Option<Self> {
        let kind = match code {
            1 => Self::EncodingError,
            2 => Self::UnknownPlugin,
            3 => Self::DuplicatePlugin,
            4 => Self::BadSequence,
            5 => Self::InsufficientFunds,
            6 => Self::UnknownAccount,
            7 => Self::Unauthorized,
            8 => Self::InvalidInput,
            9 => Self::ChainNotRegistered,
            10 => Self::ChainAlreadyRegistered,
            11 => Self::InvalidHeader,
            12 => Self::NotTrusted,
            13 => Self::InvalidProof,
            14 => Self::PacketSequence,
            15 => Self::UnknownPacketType,
            16 => Self::UnknownRequest,
            17 => Self::Lifecycle,
            18 => Self::Internal,
            _ => return None,
        };
        Some(kind)
    }

    /// Return the wire code of this kind.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EncodingError => "ERR_ENCODING",
            Self::UnknownPlugin => "ERR_UNKNOWN_PLUGIN",
            Self::DuplicatePlugin => "ERR_DUPLICATE_PLUGIN",
            Self::BadSequence => "ERR_BAD_SEQUENCE",
            Self::InsufficientFunds => "ERR_INSUFFICIENT_FUNDS",
            Self::UnknownAccount => "ERR_UNKNOWN_ACCOUNT",
            Self::Unauthorized => "ERR_UNAUTHORIZED",
            Self::InvalidInput => "ERR_INVALID_INPUT",
            Self::ChainNotRegistered => "ERR_CHAIN_NOT_REGISTERED",
            Self::ChainAlreadyRegistered => "ERR_CHAIN_ALREADY_REGISTERED",
            Self::InvalidHeader => "ERR_INVALID_HEADER",
            Self::NotTrusted => "ERR_NOT_TRUSTED",
            Self::InvalidProof => "ERR_INVALID_PROOF",
            Self::PacketSequence => "ERR_PACKET_SEQUENCE",
            Self::UnknownPacketType => "ERR_UNKNOWN_PACKET_TYPE",
            Self::UnknownRequest => "ERR_UNKNOWN_REQUEST",
            Self::Lifecycle => "ERR_LIFECYCLE",
            Self::Internal => "ERR_INTERNAL",
        };
        f.write_str(name)
    }
}

/// A structured rejection: kind plus human-readable log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {log}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub log: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, log: impl Into<String>) -> Self {
        Self { kind, log: log.into() }
    }

    pub fn encoding(log: impl Into<String>) -> Self {
        Self::new(ErrorKind::EncodingError, log)
    }

    pub fn unknown_plugin(name: &str) -> Self {
        Self::new(ErrorKind::UnknownPlugin, format!("unknown plugin: {name}"))
    }

    pub fn bad_sequence(expected: u64, got: u64) -> Self {
        Self::new(
            ErrorKind::BadSequence,
            format!("sequence mismatch: expected {expected}, got {got}"),
        )
    }

    pub fn insufficient_funds(log: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientFunds, log)
    }

    pub fn unauthorized(log: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, log)
    }

    pub fn invalid_input(log: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, log)
    }

    pub fn internal(log: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, log)
    }

    /// Prefix the log with caller context, keeping the kind.
    pub fn prepend_log(mut self, prefix: &str) -> Self {
        self.log = format!("{prefix}: {}", self.log);
        self
    }

    /// Append detail to the log, keeping the kind.
    pub fn append_log(mut self, suffix: &str) -> Self {
        self.log = format!("{}; {suffix}", self.log);
        self
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<crate::codec::CodecError> for AppError {
    fn from(err: crate::codec::CodecError) -> Self {
        Self::encoding(err.to_string())
    }
}

/// Convenience result type for transaction processing.
pub type AppResult<T> = Result<T, AppError>;

/// Failure of a commit.
///
/// `Commit` and `Halted` mean the authoritative state root is
/// indeterminate and the hosting process must halt. `OutOfPhase` is a
/// driver misuse that leaves the application untouched.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("commit of persistent store failed: {0}")]
    Commit(#[from] StoreError),

    #[error("application halted after an earlier fatal commit failure")]
    Halted,

    #[error("commit not allowed in phase {0}")]
    OutOfPhase(String),
}
