//! Record types for the metadata store
//!
//! Monetary fields are [`Money`] and serialize as decimal strings; nothing in
//! this crate touches floating point.

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{AccountId, AccountType, Currency, CustomerId, Money, TransferId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account metadata row: one per ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Ledger account this row describes
    pub account_id: AccountId,

    /// Owning customer
    pub customer_id: CustomerId,

    /// Account type
    pub account_type: AccountType,

    /// Currency book
    pub currency: Currency,

    /// Optional nickname shown to the customer
    pub account_name: Option<String>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Loan type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    /// Equal per-period payment across the term
    Annuity,
    /// Equal per-period principal; interest decreases each period
    Serial,
}

/// Payment frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    /// Every 7 days
    Weekly,
    /// Every 14 days
    BiWeekly,
    /// Every calendar month
    Monthly,
}

impl PaymentFrequency {
    /// Payment periods per year
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::BiWeekly => 26,
            PaymentFrequency::Monthly => 12,
        }
    }

    /// Next payment date after `date`
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        match self {
            PaymentFrequency::Weekly => date + chrono::Duration::days(7),
            PaymentFrequency::BiWeekly => date + chrono::Duration::days(14),
            PaymentFrequency::Monthly => date + chrono::Months::new(1),
        }
    }
}

/// Loan fee with an explicit field set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fee {
    /// Fee type label (origination, processing, ...)
    #[serde(rename = "type")]
    pub fee_type: String,

    /// Fee amount
    pub amount: Money,

    /// Human-readable description
    pub description: String,
}

/// Loan payment plan
///
/// Created alongside the loan account; `remaining_payments` strictly
/// decreases and the plan is terminal at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPlan {
    /// Loan account this plan amortizes
    pub account_id: AccountId,

    /// Owning customer
    pub customer_id: CustomerId,

    /// Loan principal
    pub principal: Money,

    /// Annual interest rate in percent (scaled decimal, e.g. 4.50)
    pub interest_rate: Decimal,

    /// Term in months
    pub term_months: u32,

    /// Loan type
    pub loan_type: LoanType,

    /// Payment frequency
    pub payment_frequency: PaymentFrequency,

    /// Fees charged at origination
    pub fees: Vec<Fee>,

    /// Principal plus all fees
    pub total_loan_amount: Money,

    /// Per-period payment amount
    pub monthly_payment: Money,

    /// Payments still owed
    pub remaining_payments: u32,

    /// Due date of the next payment
    pub next_payment_date: NaiveDate,

    /// Designated deposit account for scheduled payments, when the
    /// primary-account policy is in use
    pub primary_account_id: Option<AccountId>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl PaymentPlan {
    /// True once every payment has been applied
    pub fn is_terminal(&self) -> bool {
        self.remaining_payments == 0
    }
}

/// Transfer history row, authored exclusively by the CDC consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Ledger transfer id
    pub transfer_id: TransferId,

    /// Debited account
    pub from_account_id: AccountId,

    /// Credited account
    pub to_account_id: AccountId,

    /// Amount moved (carries the currency)
    pub amount: Money,

    /// Optional description
    pub description: Option<String>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

/// External transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalTransactionType {
    /// Funds leaving the bank
    SepaOutgoing,
    /// Funds arriving at the bank
    SepaIncoming,
}

/// External transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalTransactionStatus {
    /// Accepted, settlement scheduled
    Pending,
    /// Settled at the external network
    Settled,
    /// Settlement failed
    Failed,
}

/// Counterparty details with an explicit field set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalBankInfo {
    /// Debtor IBAN
    pub debtor_iban: String,

    /// Creditor IBAN
    pub creditor_iban: String,

    /// Debtor BIC, when known
    pub debtor_bic: Option<String>,

    /// Creditor BIC, when known
    pub creditor_bic: Option<String>,
}

/// External (SEPA) transaction record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTransaction {
    /// External transaction identifier (network format)
    pub external_transaction_id: String,

    /// Customer account moved against the suspense account
    pub account_id: AccountId,

    /// Ledger transfer realizing the movement
    pub transfer_id: Option<TransferId>,

    /// Direction
    pub transaction_type: ExternalTransactionType,

    /// Amount (carries the currency)
    pub amount: Money,

    /// Current status
    pub status: ExternalTransactionStatus,

    /// Counterparty details
    pub external_bank_info: ExternalBankInfo,

    /// Optional description
    pub description: Option<String>,

    /// Row creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}
