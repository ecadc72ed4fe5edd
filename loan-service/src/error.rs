//! Error types for the loan service

use thiserror::Error;

/// Result type for loan operations
pub type Result<T> = std::result::Result<T, LoanError>;

/// Loan service errors
#[derive(Error, Debug)]
pub enum LoanError {
    /// Invalid loan parameters (term, rate, principal)
    #[error("loan validation failed: {0}")]
    Validation(String),

    /// Disbursement exceeds the loan account's available balance
    #[error("insufficient loan funds: requested {requested}, available {available}")]
    InsufficientLoanFunds {
        /// Amount requested, minor units
        requested: i128,
        /// Amount available, minor units
        available: i128,
    },

    /// Operation addressed an account of the wrong type
    #[error("account type invalid: expected {expected}, found {found}")]
    AccountTypeInvalid {
        /// Required account type
        expected: &'static str,
        /// Actual account type
        found: String,
    },

    /// Disbursement amount is zero or negative
    #[error("amount must be positive")]
    AmountNonPositive,

    /// Referenced account does not exist in the ledger
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// Ledger engine failure
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Per-entry ledger rejection
    #[error("transfer rejected: {0}")]
    Transfer(ledger_core::CreateTransferError),

    /// Metadata store failure
    #[error("store error: {0}")]
    Store(#[from] metadata_store::StoreError),
}
