//! SEPA message and transfer types

use chrono::{DateTime, Utc};
use ledger_core::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::error::SepaError;

/// Currencies accepted by the SEPA adapter
pub const SEPA_CURRENCIES: [Currency; 4] = [
    Currency::EUR,
    Currency::NOK,
    Currency::SEK,
    Currency::DKK,
];

/// Message direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SepaDirection {
    /// Funds leaving the bank
    Outgoing,
    /// Funds arriving at the bank
    Incoming,
}

impl SepaDirection {
    /// Short code used in transaction identifiers
    pub fn code(&self) -> &'static str {
        match self {
            SepaDirection::Outgoing => "OUT",
            SepaDirection::Incoming => "IN",
        }
    }
}

/// Message urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SepaUrgency {
    /// Settles next business day
    Standard,
    /// Settles within hours, subject to the cut-off time
    Express,
    /// Settles within seconds, any day
    Instant,
}

/// An external payment message submitted to the adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SepaMessage {
    /// Direction
    pub direction: SepaDirection,

    /// Amount (carries the currency)
    pub amount: Money,

    /// Debtor IBAN
    pub debtor_iban: String,

    /// Creditor IBAN
    pub creditor_iban: String,

    /// Debtor BIC, when known
    pub debtor_bic: Option<String>,

    /// Creditor BIC, when known
    pub creditor_bic: Option<String>,

    /// Urgency
    pub urgency: SepaUrgency,

    /// Free-text description
    pub description: Option<String>,
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SepaResponseStatus {
    /// Accepted; settlement scheduled
    Accepted,
    /// Rejected with an error code
    Rejected,
    /// Accepted but awaiting asynchronous confirmation
    Pending,
}

/// Response to a submitted message
#[derive(Debug, Clone)]
pub struct SepaResponse {
    /// Outcome
    pub status: SepaResponseStatus,

    /// Assigned transaction id on acceptance
    pub sepa_transaction_id: Option<String>,

    /// Estimated settlement time on acceptance
    pub estimated_settlement: Option<DateTime<Utc>>,

    /// Rejection code otherwise
    pub error: Option<SepaError>,
}

impl SepaResponse {
    /// Accepted response
    pub fn accepted(transaction_id: String, estimated_settlement: DateTime<Utc>) -> Self {
        Self {
            status: SepaResponseStatus::Accepted,
            sepa_transaction_id: Some(transaction_id),
            estimated_settlement: Some(estimated_settlement),
            error: None,
        }
    }

    /// Rejected response
    pub fn rejected(error: SepaError) -> Self {
        Self {
            status: SepaResponseStatus::Rejected,
            sepa_transaction_id: None,
            estimated_settlement: None,
            error: Some(error),
        }
    }
}

/// Settlement state of an accepted transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SepaTransferState {
    /// Accepted, settlement scheduled
    Pending,
    /// Settled at the scheduled time
    Settled,
    /// Settlement failed
    Failed,
}

/// An accepted transfer tracked until settlement
#[derive(Debug, Clone)]
pub struct SepaTransfer {
    /// Assigned transaction id
    pub transaction_id: String,

    /// The accepted message
    pub message: SepaMessage,

    /// Current state
    pub state: SepaTransferState,

    /// Acceptance time
    pub created_at: DateTime<Utc>,

    /// Scheduled settlement time
    pub estimated_settlement: DateTime<Utc>,

    /// Actual settlement time, once reached
    pub settled_at: Option<DateTime<Utc>>,
}

/// Audit record written when a settlement timer fires
#[derive(Debug, Clone)]
pub struct SettlementAudit {
    /// Transaction settled or failed
    pub transaction_id: String,

    /// Final state
    pub state: SepaTransferState,

    /// When the timer fired
    pub timestamp: DateTime<Utc>,
}
