//! SEPA error codes and retryability classification

use thiserror::Error;

/// Result type for SEPA operations
pub type Result<T> = std::result::Result<T, SepaError>;

/// SEPA rejection and failure codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SepaError {
    /// IBAN failed country, length or checksum validation
    #[error("invalid IBAN: {0}")]
    InvalidIban(String),

    /// Currency outside the SEPA set
    #[error("currency not supported: {0}")]
    CurrencyNotSupported(String),

    /// Per-transaction or daily cap exceeded, or non-positive amount
    #[error("amount limit exceeded")]
    AmountLimitExceeded,

    /// Compliance screening rejected the message
    #[error("compliance violation")]
    ComplianceViolation,

    /// Counterparty account is closed
    #[error("account closed")]
    AccountClosed,

    /// Fraud screening blocked the message
    #[error("fraud block")]
    FraudBlock,

    /// Receiving bank rejected the message
    #[error("bank rejection: {0}")]
    BankRejection(String),

    /// Debtor account lacks funds
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Network timed out; safe to retry
    #[error("network timeout")]
    NetworkTimeout,

    /// Express message submitted after the cut-off hour
    #[error("cut-off time exceeded")]
    CutOffTimeExceeded,

    /// Non-instant message on a weekend or holiday
    #[error("holiday processing not available")]
    HolidayProcessing,
}

impl SepaError {
    /// Whether resubmitting the same message later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SepaError::InsufficientFunds
                | SepaError::NetworkTimeout
                | SepaError::CutOffTimeExceeded
                | SepaError::HolidayProcessing
        )
    }
}
