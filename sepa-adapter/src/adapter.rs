//! SEPA adapter: validation pipeline and settlement state machine
//!
//! A message passes IBAN, currency and amount validation, then the business
//! rules (cut-off, weekends, daily cap, per-bank behavior). Accepted
//! messages get a transaction id and a settlement estimate; a timer advances
//! the transfer from `Pending` to `Settled` at that time, or to `Failed`
//! when the simulated transport drops the scheduled task.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use ledger_core::Currency;

use crate::config::SepaConfig;
use crate::error::SepaError;
use crate::iban;
use crate::rules::{self, BankResponseConfig};
use crate::types::{
    SepaMessage, SepaResponse, SepaTransfer, SepaTransferState, SettlementAudit, SEPA_CURRENCIES,
};

/// SEPA network adapter (simulated)
pub struct SepaAdapter {
    config: SepaConfig,
    bank_directory: RwLock<HashMap<String, BankResponseConfig>>,
    daily_totals: Mutex<HashMap<(NaiveDate, Currency), i128>>,
    transfers: DashMap<String, SepaTransfer>,
    audit: Mutex<Vec<SettlementAudit>>,
    forced_error: Mutex<Option<SepaError>>,
    timers: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl SepaAdapter {
    /// Create an adapter with the given business-rule configuration
    pub fn new(config: SepaConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            bank_directory: RwLock::new(HashMap::new()),
            daily_totals: Mutex::new(HashMap::new()),
            transfers: DashMap::new(),
            audit: Mutex::new(Vec::new()),
            forced_error: Mutex::new(None),
            timers: Mutex::new(Vec::new()),
        })
    }

    /// Configure the simulated response behavior of one bank (by BIC)
    pub fn configure_bank(&self, bic: impl Into<String>, config: BankResponseConfig) {
        self.bank_directory.write().insert(bic.into(), config);
    }

    /// Test hook: the next message fails with exactly this error
    pub fn inject_error(&self, error: SepaError) {
        *self.forced_error.lock() = Some(error);
    }

    /// Accepted transfer by transaction id
    pub fn transfer(&self, transaction_id: &str) -> Option<SepaTransfer> {
        self.transfers.get(transaction_id).map(|t| t.clone())
    }

    /// Settlement audit trail, oldest first
    pub fn audit_entries(&self) -> Vec<SettlementAudit> {
        self.audit.lock().clone()
    }

    /// Accepted volume for a UTC date and currency, minor units
    pub fn daily_total(&self, date: NaiveDate, currency: Currency) -> i128 {
        self.daily_totals
            .lock()
            .get(&(date, currency))
            .copied()
            .unwrap_or(0)
    }

    /// Cancel outstanding settlement timers and clear the forced error
    pub fn reset(&self) {
        for timer in self.timers.lock().drain(..) {
            timer.abort();
        }
        *self.forced_error.lock() = None;
        info!("sepa adapter reset, settlement timers cancelled");
    }

    /// Process a message against the current wall clock
    pub async fn process(self: &Arc<Self>, message: SepaMessage) -> SepaResponse {
        self.process_at(message, Utc::now()).await
    }

    /// Process a message at an explicit instant (tests pin the clock)
    pub async fn process_at(
        self: &Arc<Self>,
        message: SepaMessage,
        now: DateTime<Utc>,
    ) -> SepaResponse {
        if let Err(error) = self.evaluate(&message, now) {
            info!(error = %error, retryable = error.is_retryable(), "sepa message rejected");
            return SepaResponse::rejected(error);
        }

        let amount = message.amount;
        let estimated_settlement = rules::estimate_settlement(message.urgency, now);
        let transaction_id = self.allocate_transaction_id(&message, now);

        // The daily cap counts accepted amounts only.
        *self
            .daily_totals
            .lock()
            .entry((now.date_naive(), amount.currency()))
            .or_insert(0) += amount.minor_units();

        let transfer = SepaTransfer {
            transaction_id: transaction_id.clone(),
            message,
            state: SepaTransferState::Pending,
            created_at: now,
            estimated_settlement,
            settled_at: None,
        };
        self.transfers.insert(transaction_id.clone(), transfer);

        self.schedule_settlement(transaction_id.clone(), estimated_settlement, now);

        info!(
            transaction_id = %transaction_id,
            amount = %amount,
            settlement = %estimated_settlement,
            "sepa message accepted"
        );

        SepaResponse::accepted(transaction_id, estimated_settlement)
    }

    /// Validation and business rules, in order
    fn evaluate(&self, message: &SepaMessage, now: DateTime<Utc>) -> Result<(), SepaError> {
        // The injected error overrides everything else, once.
        if let Some(error) = self.forced_error.lock().take() {
            return Err(error);
        }

        iban::validate(&message.debtor_iban)?;
        iban::validate(&message.creditor_iban)?;

        let currency = message.amount.currency();
        if !SEPA_CURRENCIES.contains(&currency) {
            return Err(SepaError::CurrencyNotSupported(currency.to_string()));
        }

        let amount = message.amount.minor_units();
        if amount <= 0 || amount > self.config.max_transaction_cap_minor {
            return Err(SepaError::AmountLimitExceeded);
        }

        rules::check_cut_off(message.urgency, now, self.config.cut_off_hour)?;
        rules::check_weekend(message.urgency, now, self.config.simulate_weekends)?;

        // Daily cap: accepting this amount must not push the UTC-date total
        // past the cap; landing exactly on it is fine.
        let total = self.daily_total(now.date_naive(), currency);
        if total + amount > self.config.daily_cap_minor {
            return Err(SepaError::AmountLimitExceeded);
        }

        if let Some(bic) = &message.creditor_bic {
            let bank = self
                .bank_directory
                .read()
                .get(bic)
                .copied()
                .unwrap_or_default();
            if !bank.accepts {
                return Err(SepaError::BankRejection(format!("{} does not accept", bic)));
            }
            if bank.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < bank.error_rate {
                return Err(SepaError::BankRejection(format!(
                    "{} transient rejection",
                    bic
                )));
            }
        }

        Ok(())
    }

    fn allocate_transaction_id(&self, message: &SepaMessage, now: DateTime<Utc>) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        let suffix: String = (0..6)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();

        format!(
            "SEPA_{}_{}_{}_{}",
            message.direction.code(),
            message.amount.currency(),
            now.timestamp_millis(),
            suffix
        )
    }

    /// Arm the settlement timer for an accepted transfer
    fn schedule_settlement(
        self: &Arc<Self>,
        transaction_id: String,
        estimated_settlement: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let delay = (estimated_settlement - now)
            .to_std()
            .unwrap_or_default();

        let adapter = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            adapter.settle(&transaction_id);
        });
        self.timers.lock().push(timer);
    }

    /// Advance one transfer out of `Pending` when its timer fires
    fn settle(&self, transaction_id: &str) {
        let Some(mut transfer) = self.transfers.get_mut(transaction_id) else {
            return;
        };
        if transfer.state != SepaTransferState::Pending {
            return;
        }

        let now = Utc::now();
        let failed = self.config.settlement_failure_rate > 0.0
            && rand::thread_rng().gen::<f64>() < self.config.settlement_failure_rate;

        if failed {
            transfer.state = SepaTransferState::Failed;
            warn!(transaction_id, "sepa settlement failed in transport");
        } else {
            transfer.state = SepaTransferState::Settled;
            transfer.settled_at = Some(now);
            info!(transaction_id, "sepa transfer settled");
        }

        self.audit.lock().push(SettlementAudit {
            transaction_id: transaction_id.to_string(),
            state: transfer.state,
            timestamp: now,
        });
    }
}
