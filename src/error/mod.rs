//! Error handling for the ledger
//!
//! Every operation fails with one [`LedgerError`]. Callers that only care about
//! the category use [`LedgerError::kind`]; store and codec failures collapse
//! into [`ErrorKind::Internal`] and never show their details to the caller.

use std::fmt;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Caller-facing error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationFailed,
    Unauthorized,
    NotFound,
    Conflict,
    ChainUninitialized,
    NoWork,
    MiningAborted,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for the transport layer
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "VALIDATION_FAILED",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::ChainUninitialized => "CHAIN_UNINITIALIZED",
            ErrorKind::NoWork => "NO_WORK",
            ErrorKind::MiningAborted => "MINING_ABORTED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error types for ledger operations
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Malformed or rejected input
    #[error("{0}")]
    Validation(String),
    /// Sender cannot cover the requested amount
    #[error("Insufficient balance.")]
    InsufficientFunds { required: u64, available: i128 },
    /// The presented key does not belong to the claimed address
    #[error("{0}")]
    Unauthorized(String),
    /// The private key could not be parsed for the configured curve
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    /// Unknown id or a missing precondition record
    #[error("{0}")]
    NotFound(String),
    /// Mutation of settled state or a unique-constraint violation
    #[error("{0}")]
    Conflict(String),
    /// No genesis block has been written yet
    #[error("Unable to create block: no previous block found.")]
    ChainUninitialized,
    /// No pending transactions are available for sealing
    #[error("Unable to create block: no transactions available to add to a block.")]
    NoWork,
    /// The proof-of-work search stopped before finding a hash
    #[error("Mining aborted: {0}")]
    MiningAborted(String),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Store, codec or crypto backend failure. The detail is logged, not shown.
    #[error("Internal error")]
    Internal(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::Config(_) => ErrorKind::ValidationFailed,
            LedgerError::Unauthorized(_) | LedgerError::InvalidKey(_) => ErrorKind::Unauthorized,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::ChainUninitialized => ErrorKind::ChainUninitialized,
            LedgerError::NoWork => ErrorKind::NoWork,
            LedgerError::MiningAborted(_) => ErrorKind::MiningAborted,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        log::error!("Internal ledger failure: {detail}");
        LedgerError::Internal(detail)
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::internal(format!("I/O error: {err}"))
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::internal(format!("Database error: {err}"))
    }
}

impl From<sled::transaction::TransactionError<LedgerError>> for LedgerError {
    fn from(err: sled::transaction::TransactionError<LedgerError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => e.into(),
        }
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::internal(format!("Serialization error: {err}"))
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::internal(format!("Deserialization error: {err}"))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::internal(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
