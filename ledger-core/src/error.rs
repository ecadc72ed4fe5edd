//! Error types for the ledger engine
//!
//! Per-entry batch failures are not represented here: they are data
//! (`CreateAccountError` / `CreateTransferError` in [`crate::ops`]) so that
//! one bad entry never fails its siblings.

use thiserror::Error;

use crate::types::Currency;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Arithmetic over two different currency books
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the left operand
        expected: Currency,
        /// Currency of the offending operand
        found: Currency,
    },

    /// 128-bit overflow in money arithmetic
    #[error("amount overflow")]
    AmountOverflow,

    /// Amount text that does not parse as money
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Identifier text that does not parse as a decimal 128-bit value
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Customer id violating the `[A-Za-z0-9_-]{1,50}` constraint
    #[error("invalid customer id: {0}")]
    InvalidCustomerId(String),

    /// Storage error (RocksDB)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, response dropped)
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
