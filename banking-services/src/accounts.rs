//! Customer account service
//!
//! Composes the ledger engine and the metadata store: every customer
//! account exists in both, and opening balances are funded from the
//! per-currency equity account. Transfer history is NOT written here; the
//! CDC consumer owns that table.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use ledger_core::actor::LedgerHandle;
use ledger_core::{
    AccountId, AccountType, Currency, CustomerId, Money, NewAccount, NewTransfer, TransferId,
    TransferKind,
};
use metadata_store::{AccountRecord, AccountRepository};

use crate::error::{Result, ServiceError};
use crate::system_accounts::SystemAccountRegistry;

/// Customer-facing account operations
pub struct AccountService {
    ledger: LedgerHandle,
    accounts: Arc<dyn AccountRepository>,
    registry: Arc<SystemAccountRegistry>,
}

impl AccountService {
    /// Create the service over its collaborators
    pub fn new(
        ledger: LedgerHandle,
        accounts: Arc<dyn AccountRepository>,
        registry: Arc<SystemAccountRegistry>,
    ) -> Self {
        Self {
            ledger,
            accounts,
            registry,
        }
    }

    /// Open a deposit or credit account, optionally funded with an opening
    /// balance from the currency's equity account
    pub async fn open_account(
        &self,
        customer_id: CustomerId,
        account_type: AccountType,
        currency: Currency,
        nickname: Option<String>,
        opening_balance: Option<Money>,
    ) -> Result<AccountId> {
        let results = self
            .ledger
            .create_accounts(vec![NewAccount::for_type(currency, account_type)
                .with_user_tag(customer_id.as_str())])
            .await?;
        let account_id = results[0].map_err(ServiceError::Account)?;

        let now = Utc::now();
        self.accounts
            .upsert(AccountRecord {
                account_id,
                customer_id: customer_id.clone(),
                account_type,
                currency,
                account_name: nickname,
                created_at: now,
                updated_at: now,
            })
            .await?;

        if let Some(balance) = opening_balance {
            if balance.is_positive() {
                let equity = self
                    .registry
                    .equity_account(currency)
                    .ok_or_else(|| ServiceError::SystemAccountMissing(
                        SystemAccountRegistry::equity_key(currency),
                    ))?;

                let results = self
                    .ledger
                    .create_transfers(vec![NewTransfer::single_phase(
                        equity,
                        account_id,
                        balance,
                        TransferKind::InitialFunding,
                    )])
                    .await?;
                results[0].map_err(ServiceError::Transfer)?;
            }
        }

        info!(
            account_id = %account_id,
            customer_id = %customer_id,
            %currency,
            ?account_type,
            "account opened"
        );

        Ok(account_id)
    }

    /// Current balance of an account
    pub async fn balance(&self, account_id: AccountId) -> Result<Money> {
        let account = self
            .ledger
            .lookup_accounts(vec![account_id])
            .await?
            .pop()
            .flatten()
            .ok_or_else(|| ServiceError::NotFound(account_id.to_string()))?;
        Ok(account.balance_money())
    }

    /// Transfer between two customer accounts (single-phase)
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Money,
        reference: Option<String>,
    ) -> Result<TransferId> {
        let mut spec = NewTransfer::single_phase(from, to, amount, TransferKind::CustomerTransfer);
        spec.reference = reference;

        let results = self.ledger.create_transfers(vec![spec]).await?;
        results[0].map_err(ServiceError::Transfer)
    }

    /// Update an account nickname
    pub async fn update_nickname(&self, account_id: AccountId, name: Option<String>) -> Result<()> {
        self.accounts.update_nickname(account_id, name).await?;
        Ok(())
    }

    /// All metadata rows for one customer
    pub async fn accounts_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<AccountRecord>> {
        Ok(self.accounts.list_by_customer(customer_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Config, Ledger};
    use metadata_store::MemoryStore;

    struct Fixture {
        ledger: Ledger,
        service: AccountService,
        _temp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().join("ledger");
        let ledger = Ledger::open(config).await.unwrap();

        let registry = Arc::new(
            SystemAccountRegistry::load(temp.path().join("system-accounts.json")).unwrap(),
        );
        registry
            .ensure(&ledger.handle(), &[Currency::USD])
            .await
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        let service = AccountService::new(ledger.handle(), store, registry);

        Fixture {
            ledger,
            service,
            _temp: temp,
        }
    }

    fn customer() -> CustomerId {
        CustomerId::new("CUSTOMER-ABC-123").unwrap()
    }

    #[tokio::test]
    async fn test_open_account_with_opening_balance() {
        let f = fixture().await;

        let account = f
            .service
            .open_account(
                customer(),
                AccountType::Deposit,
                Currency::USD,
                Some("Main account".to_string()),
                Some(Money::new(50000, Currency::USD)),
            )
            .await
            .unwrap();

        assert_eq!(
            f.service.balance(account).await.unwrap(),
            Money::new(50000, Currency::USD)
        );

        let rows = f.service.accounts_for_customer(&customer()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account_name.as_deref(), Some("Main account"));

        f.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_between_customer_accounts() {
        let f = fixture().await;

        let a = f
            .service
            .open_account(
                customer(),
                AccountType::Deposit,
                Currency::USD,
                None,
                Some(Money::new(50000, Currency::USD)),
            )
            .await
            .unwrap();
        let b = f
            .service
            .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
            .await
            .unwrap();

        f.service
            .transfer(a, b, Money::new(3000, Currency::USD), None)
            .await
            .unwrap();

        assert_eq!(
            f.service.balance(a).await.unwrap(),
            Money::new(47000, Currency::USD)
        );
        assert_eq!(
            f.service.balance(b).await.unwrap(),
            Money::new(3000, Currency::USD)
        );

        f.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_without_funds_rejected() {
        let f = fixture().await;

        let a = f
            .service
            .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
            .await
            .unwrap();
        let b = f
            .service
            .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
            .await
            .unwrap();

        let result = f
            .service
            .transfer(a, b, Money::new(1, Currency::USD), None)
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Transfer(
                ledger_core::CreateTransferError::InsufficientFunds
            ))
        ));

        f.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_nickname_update() {
        let f = fixture().await;

        let account = f
            .service
            .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
            .await
            .unwrap();

        f.service
            .update_nickname(account, Some("Vacation".to_string()))
            .await
            .unwrap();

        let rows = f.service.accounts_for_customer(&customer()).await.unwrap();
        assert_eq!(rows[0].account_name.as_deref(), Some("Vacation"));

        f.ledger.shutdown().await.unwrap();
    }
}
