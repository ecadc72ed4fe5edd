//! In-process store implementation
//!
//! Stands in for the external relational driver in tests and the demo
//! container. Enforces the same uniqueness and referential rules the real
//! store would.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ledger_core::{AccountId, AccountType, CustomerId, TransferId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, StoreError};
use crate::repository::{
    AccountRepository, ExternalTransactionRepository, PaymentPlanRepository,
    TransferHistoryRepository,
};
use crate::types::{
    AccountRecord, ExternalTransaction, ExternalTransactionStatus, PaymentPlan, TransferRecord,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, AccountRecord>,
    plans: HashMap<AccountId, PaymentPlan>,
    transfers: Vec<TransferRecord>,
    external: HashMap<String, ExternalTransaction>,
}

/// In-memory metadata store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn upsert(&self, record: AccountRecord) -> Result<()> {
        self.inner.write().accounts.insert(record.account_id, record);
        Ok(())
    }

    async fn get(&self, account_id: AccountId) -> Result<Option<AccountRecord>> {
        Ok(self.inner.read().accounts.get(&account_id).cloned())
    }

    async fn list_by_customer(&self, customer_id: &CustomerId) -> Result<Vec<AccountRecord>> {
        let inner = self.inner.read();
        let mut rows: Vec<AccountRecord> = inner
            .accounts
            .values()
            .filter(|r| &r.customer_id == customer_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn list_by_customer_and_type(
        &self,
        customer_id: &CustomerId,
        account_type: AccountType,
    ) -> Result<Vec<AccountRecord>> {
        let mut rows = self.list_by_customer(customer_id).await?;
        rows.retain(|r| r.account_type == account_type);
        Ok(rows)
    }

    async fn update_nickname(&self, account_id: AccountId, name: Option<String>) -> Result<()> {
        let mut inner = self.inner.write();
        let record = inner
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;
        record.account_name = name;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, account_id: AccountId) -> Result<()> {
        let mut inner = self.inner.write();

        let open_plan = inner
            .plans
            .get(&account_id)
            .map_or(false, |p| !p.is_terminal());
        let referenced = inner
            .transfers
            .iter()
            .any(|t| t.from_account_id == account_id || t.to_account_id == account_id);
        if open_plan || referenced {
            return Err(StoreError::Conflict(format!(
                "account {} is referenced by an open plan or transfer history",
                account_id
            )));
        }

        inner
            .accounts
            .remove(&account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl PaymentPlanRepository for MemoryStore {
    async fn upsert(&self, plan: PaymentPlan) -> Result<()> {
        self.inner.write().plans.insert(plan.account_id, plan);
        Ok(())
    }

    async fn get(&self, account_id: AccountId) -> Result<Option<PaymentPlan>> {
        Ok(self.inner.read().plans.get(&account_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<PaymentPlan>> {
        let inner = self.inner.read();
        let mut plans: Vec<PaymentPlan> = inner.plans.values().cloned().collect();
        plans.sort_by_key(|p| p.account_id);
        Ok(plans)
    }

    async fn list_due(&self, on_or_before: NaiveDate) -> Result<Vec<PaymentPlan>> {
        let mut plans = self.list_all().await?;
        plans.retain(|p| !p.is_terminal() && p.next_payment_date <= on_or_before);
        Ok(plans)
    }

    async fn record_payment(&self, account_id: AccountId) -> Result<PaymentPlan> {
        let mut inner = self.inner.write();
        let plan = inner
            .plans
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;

        if plan.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "plan for account {} is already fully paid",
                account_id
            )));
        }

        plan.remaining_payments -= 1;
        if plan.remaining_payments > 0 {
            plan.next_payment_date = plan.payment_frequency.advance(plan.next_payment_date);
        }
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }

    async fn set_next_payment_date(&self, account_id: AccountId, date: NaiveDate) -> Result<()> {
        let mut inner = self.inner.write();
        let plan = inner
            .plans
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;
        plan.next_payment_date = date;
        plan.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, account_id: AccountId) -> Result<()> {
        self.inner
            .write()
            .plans
            .remove(&account_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))
    }
}

#[async_trait]
impl TransferHistoryRepository for MemoryStore {
    async fn insert(&self, record: TransferRecord) -> Result<()> {
        let mut inner = self.inner.write();
        // Replayed CDC events must leave the table unchanged.
        if inner.transfers.iter().any(|t| t.transfer_id == record.transfer_id) {
            return Ok(());
        }
        inner.transfers.push(record);
        Ok(())
    }

    async fn list_by_account(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<TransferRecord>> {
        let inner = self.inner.read();
        let mut rows: Vec<TransferRecord> = inner
            .transfers
            .iter()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<TransferRecord>> {
        let inner = self.inner.read();
        let mut rows: Vec<TransferRecord> = inner.transfers.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl ExternalTransactionRepository for MemoryStore {
    async fn insert(&self, tx: ExternalTransaction) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.external.contains_key(&tx.external_transaction_id) {
            return Err(StoreError::Duplicate(tx.external_transaction_id));
        }
        inner.external.insert(tx.external_transaction_id.clone(), tx);
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<ExternalTransaction>> {
        Ok(self.inner.read().external.get(external_id).cloned())
    }

    async fn list_by_account(&self, account_id: AccountId) -> Result<Vec<ExternalTransaction>> {
        let inner = self.inner.read();
        let mut rows: Vec<ExternalTransaction> = inner
            .external
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_status(
        &self,
        external_id: &str,
        status: ExternalTransactionStatus,
        transfer_id: Option<TransferId>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let tx = inner
            .external
            .get_mut(external_id)
            .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;
        tx.status = status;
        if transfer_id.is_some() {
            tx.transfer_id = transfer_id;
        }
        tx.updated_at = Utc::now();
        Ok(())
    }
}
