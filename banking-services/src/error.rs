//! Error types for the banking services layer

use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Banking service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Ledger engine failure
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Per-entry account rejection
    #[error("account rejected: {0}")]
    Account(ledger_core::CreateAccountError),

    /// Per-entry transfer rejection
    #[error("transfer rejected: {0}")]
    Transfer(ledger_core::CreateTransferError),

    /// Metadata store failure
    #[error("store error: {0}")]
    Store(#[from] metadata_store::StoreError),

    /// Loan service failure
    #[error("loan error: {0}")]
    Loan(#[from] loan_service::LoanError),

    /// Missing account or record
    #[error("not found: {0}")]
    NotFound(String),

    /// System account registry missing a required entry
    #[error("system account missing: {0}")]
    SystemAccountMissing(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Registry file IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry file serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
