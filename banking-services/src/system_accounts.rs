//! System-account registry
//!
//! Well-known ledger accounts (per-currency equity and SEPA suspense) are
//! recorded in an append-only JSON file keyed by a human-readable system
//! identifier. The file is written atomically (temp file + rename) so a
//! crash never leaves a torn registry.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use ledger_core::actor::LedgerHandle;
use ledger_core::{AccountId, AccountType, Currency, NewAccount};

use crate::error::{Result, ServiceError};

/// One well-known account entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAccountEntry {
    /// Backing ledger account
    pub ledger_account_id: AccountId,

    /// Account type
    #[serde(rename = "type")]
    pub account_type: AccountType,

    /// Currency book
    pub currency: Currency,

    /// Human-readable purpose
    pub description: String,

    /// When the entry was first written
    pub created_at: DateTime<Utc>,
}

/// Registry of well-known system accounts
pub struct SystemAccountRegistry {
    path: PathBuf,
    entries: RwLock<HashMap<String, SystemAccountEntry>>,
}

impl SystemAccountRegistry {
    /// Equity identifier for a currency
    pub fn equity_key(currency: Currency) -> String {
        format!("EQUITY:{}", currency)
    }

    /// Outgoing-suspense identifier for a currency
    pub fn sepa_out_key(currency: Currency) -> String {
        format!("SEPA_OUT_SUSPENSE:{}", currency)
    }

    /// Incoming-suspense identifier for a currency
    pub fn sepa_in_key(currency: Currency) -> String {
        format!("SEPA_IN_SUSPENSE:{}", currency)
    }

    /// Load the registry file, or start empty when it does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Entry for a system identifier
    pub fn get(&self, identifier: &str) -> Option<SystemAccountEntry> {
        self.entries.read().get(identifier).cloned()
    }

    /// All registered identifiers
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Equity account for a currency
    pub fn equity_account(&self, currency: Currency) -> Option<AccountId> {
        self.get(&Self::equity_key(currency))
            .map(|e| e.ledger_account_id)
    }

    /// Outgoing SEPA suspense account for a currency
    pub fn sepa_out_suspense(&self, currency: Currency) -> Option<AccountId> {
        self.get(&Self::sepa_out_key(currency))
            .map(|e| e.ledger_account_id)
    }

    /// Incoming SEPA suspense account for a currency
    pub fn sepa_in_suspense(&self, currency: Currency) -> Option<AccountId> {
        self.get(&Self::sepa_in_key(currency))
            .map(|e| e.ledger_account_id)
    }

    /// Create any missing well-known accounts for the given currencies
    ///
    /// Existing entries are never touched: the registry only grows.
    pub async fn ensure(&self, ledger: &LedgerHandle, currencies: &[Currency]) -> Result<()> {
        for &currency in currencies {
            self.ensure_entry(
                ledger,
                Self::equity_key(currency),
                AccountType::Equity,
                currency,
                format!("{} equity funding account", currency),
            )
            .await?;
            self.ensure_entry(
                ledger,
                Self::sepa_out_key(currency),
                AccountType::Suspense,
                currency,
                format!("{} outgoing SEPA suspense", currency),
            )
            .await?;
            self.ensure_entry(
                ledger,
                Self::sepa_in_key(currency),
                AccountType::Suspense,
                currency,
                format!("{} incoming SEPA suspense", currency),
            )
            .await?;
        }
        Ok(())
    }

    async fn ensure_entry(
        &self,
        ledger: &LedgerHandle,
        identifier: String,
        account_type: AccountType,
        currency: Currency,
        description: String,
    ) -> Result<()> {
        if self.entries.read().contains_key(&identifier) {
            return Ok(());
        }

        let results = ledger
            .create_accounts(vec![
                NewAccount::for_type(currency, account_type).with_user_tag(identifier.clone())
            ])
            .await?;
        let ledger_account_id = results[0].map_err(ServiceError::Account)?;

        self.entries.write().insert(
            identifier.clone(),
            SystemAccountEntry {
                ledger_account_id,
                account_type,
                currency,
                description,
                created_at: Utc::now(),
            },
        );
        self.save()?;

        tracing::info!(identifier = %identifier, account = %ledger_account_id, "system account created");
        Ok(())
    }

    /// Write the registry atomically: temp file in the same directory, then
    /// rename over the target.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&*self.entries.read())?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl loan_service::EquitySource for SystemAccountRegistry {
    fn equity_account(&self, currency: Currency) -> Option<AccountId> {
        SystemAccountRegistry::equity_account(self, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Config, Ledger};

    async fn open_ledger(temp: &tempfile::TempDir) -> Ledger {
        let mut config = Config::default();
        config.data_dir = temp.path().join("ledger");
        Ledger::open(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_ensure_creates_and_persists() {
        let temp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&temp).await;
        let path = temp.path().join("system-accounts.json");

        let registry = SystemAccountRegistry::load(&path).unwrap();
        registry
            .ensure(&ledger.handle(), &[Currency::USD, Currency::EUR])
            .await
            .unwrap();

        assert_eq!(registry.identifiers().len(), 6);
        let equity = registry.equity_account(Currency::USD).unwrap();
        let account = ledger.get_account(equity).await.unwrap().unwrap();
        assert_eq!(account.account_type, AccountType::Equity);

        // Reload from disk: same accounts, no recreation.
        let reloaded = SystemAccountRegistry::load(&path).unwrap();
        assert_eq!(reloaded.equity_account(Currency::USD), Some(equity));

        reloaded
            .ensure(&ledger.handle(), &[Currency::USD])
            .await
            .unwrap();
        assert_eq!(reloaded.equity_account(Currency::USD), Some(equity));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_suspense_accounts_by_direction() {
        let temp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&temp).await;
        let path = temp.path().join("system-accounts.json");

        let registry = SystemAccountRegistry::load(&path).unwrap();
        registry
            .ensure(&ledger.handle(), &[Currency::EUR])
            .await
            .unwrap();

        let out = registry.sepa_out_suspense(Currency::EUR).unwrap();
        let inbound = registry.sepa_in_suspense(Currency::EUR).unwrap();
        assert_ne!(out, inbound);

        // No registration for currencies never ensured.
        assert!(registry.sepa_out_suspense(Currency::NOK).is_none());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp_file() {
        let temp = tempfile::tempdir().unwrap();
        let ledger = open_ledger(&temp).await;
        let path = temp.path().join("registry/system-accounts.json");

        let registry = SystemAccountRegistry::load(&path).unwrap();
        registry
            .ensure(&ledger.handle(), &[Currency::DKK])
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        ledger.shutdown().await.unwrap();
    }
}
