//! Repository contract consumed by the core
//!
//! The relational driver lives behind these traits; the core never sees SQL.
//! Every method fails with [`StoreError::Unavailable`] on transport errors.

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::{AccountId, AccountType, CustomerId, TransferId};

use crate::error::Result;
use crate::types::{
    AccountRecord, ExternalTransaction, ExternalTransactionStatus, PaymentPlan, TransferRecord,
};

/// Account metadata repository
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert or update one account row
    async fn upsert(&self, record: AccountRecord) -> Result<()>;

    /// Lookup by account id
    async fn get(&self, account_id: AccountId) -> Result<Option<AccountRecord>>;

    /// All accounts of one customer, oldest first
    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<AccountRecord>>;

    /// All accounts of one customer and type, oldest first
    async fn list_by_customer_and_type(
        &self,
        customer_id: &CustomerId,
        account_type: AccountType,
    ) -> Result<Vec<AccountRecord>>;

    /// Update the nickname
    async fn update_nickname(&self, account_id: AccountId, name: Option<String>) -> Result<()>;

    /// Delete one row; rejected while an open plan or transfer history
    /// references the account
    async fn delete(&self, account_id: AccountId) -> Result<()>;
}

/// Payment plan repository
#[async_trait]
pub trait PaymentPlanRepository: Send + Sync {
    /// Insert or update one plan
    async fn upsert(&self, plan: PaymentPlan) -> Result<()>;

    /// Lookup by loan account id
    async fn get(&self, account_id: AccountId) -> Result<Option<PaymentPlan>>;

    /// All plans
    async fn list_all(&self) -> Result<Vec<PaymentPlan>>;

    /// Open plans due on or before the given date
    async fn list_due(&self, on_or_before: NaiveDate) -> Result<Vec<PaymentPlan>>;

    /// Apply one successful payment: decrement `remaining_payments` and,
    /// while payments remain, advance `next_payment_date` by one period
    async fn record_payment(&self, account_id: AccountId) -> Result<PaymentPlan>;

    /// Move the next payment date
    async fn set_next_payment_date(&self, account_id: AccountId, date: NaiveDate) -> Result<()>;

    /// Delete one plan
    async fn delete(&self, account_id: AccountId) -> Result<()>;
}

/// Transfer history repository
///
/// Written only through the CDC consumer; request handlers never author rows.
#[async_trait]
pub trait TransferHistoryRepository: Send + Sync {
    /// Insert one row; inserting the same transfer id again is a no-op so
    /// replayed events leave the table unchanged
    async fn insert(&self, record: TransferRecord) -> Result<()>;

    /// Rows touching the account, most recent first
    async fn list_by_account(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<TransferRecord>>;

    /// Most recent rows across all accounts
    async fn list_recent(&self, limit: usize) -> Result<Vec<TransferRecord>>;
}

/// External (SEPA) transaction repository
#[async_trait]
pub trait ExternalTransactionRepository: Send + Sync {
    /// Insert one record
    async fn insert(&self, tx: ExternalTransaction) -> Result<()>;

    /// Lookup by external transaction id
    async fn get(&self, external_id: &str) -> Result<Option<ExternalTransaction>>;

    /// All records touching one account, most recent first
    async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<ExternalTransaction>>;

    /// Update the status and, when known, the realizing ledger transfer
    async fn update_status(
        &self,
        external_id: &str,
        status: ExternalTransactionStatus,
        transfer_id: Option<TransferId>,
    ) -> Result<()>;
}
