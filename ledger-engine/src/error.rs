//! Error types for the ledger engine

use crate::types::{RequestStatus, WalletId};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Business-rule failures (`InvalidInput`, `InsufficientStock`,
/// `InsufficientFunds`, `KeyNotFound`) are detected before any write and
/// are never retried. `ContentionExhausted` is transient; the caller may
/// resubmit the whole operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range request, always the caller's fault
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput {
        /// Offending field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Stock record exists but holds less than the requested decrement
    #[error("Insufficient stock at {key}: {available} kg on hand, {requested} kg requested")]
    InsufficientStock {
        /// Stock key that was short
        key: String,
        /// Quantity on hand at validation time
        available: Decimal,
        /// Quantity the operation asked for
        requested: Decimal,
    },

    /// Wallet exists but holds less than the requested debit
    #[error("Insufficient funds in wallet {wallet}: {available} available, {requested} requested")]
    InsufficientFunds {
        /// Wallet that was short
        wallet: WalletId,
        /// Balance at validation time
        available: Decimal,
        /// Amount the operation asked for
        requested: Decimal,
    },

    /// A decrement targeted a balance record that does not exist
    #[error("Balance record not found: {0}")]
    KeyNotFound(String),

    /// Commit conflicts exceeded the retry budget
    #[error("Commit contention not resolved after {attempts} attempts")]
    ContentionExhausted {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Financial request not found
    #[error("Request not found: {0}")]
    RequestNotFound(Uuid),

    /// Decision attempted on a request already in a terminal state
    #[error("Request {request_id} already decided: {status}")]
    RequestAlreadyDecided {
        /// The request in question
        request_id: Uuid,
        /// Its terminal status
        status: RequestStatus,
    },

    /// Transaction record not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
