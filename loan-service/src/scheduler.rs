//! Payment-processing scheduler
//!
//! Wakes on a configurable interval, loads every plan due on or before
//! today, and drives one ledger transfer per plan from the customer's
//! deposit account into the loan account. Cycles never overlap: a cycle
//! runs to completion inside the scheduler loop before the next tick is
//! honored, and shutdown cancels the next tick while awaiting the current
//! cycle.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use ledger_core::actor::LedgerHandle;
use ledger_core::{AccountId, AccountType, CustomerId, Money, NewTransfer, TransferKind};
use metadata_store::{AccountRepository, PaymentPlan, PaymentPlanRepository};

use crate::config::{DepositAccountPolicy, LoanConfig};
use crate::error::Result;

/// Outcome of processing one due plan
#[derive(Debug, Clone)]
pub struct PaymentProcessingResult {
    /// Loan account of the plan
    pub account_id: AccountId,

    /// Owning customer
    pub customer_id: CustomerId,

    /// Amount applied when the payment succeeded
    pub amount: Option<Money>,

    /// True when the ledger transfer posted and the plan advanced
    pub payment_processed: bool,

    /// Failure description otherwise
    pub error: Option<String>,
}

/// Aggregate totals for one scheduler cycle
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    /// Plans examined
    pub processed: usize,

    /// Payments applied
    pub succeeded: usize,

    /// Plans skipped with an error
    pub failed: usize,

    /// Per-plan outcomes
    pub results: Vec<PaymentProcessingResult>,
}

/// Scheduled loan-payment processor
pub struct PaymentScheduler {
    ledger: LedgerHandle,
    plans: Arc<dyn PaymentPlanRepository>,
    accounts: Arc<dyn AccountRepository>,
    config: LoanConfig,
}

impl PaymentScheduler {
    /// Create a scheduler over its collaborators
    pub fn new(
        ledger: LedgerHandle,
        plans: Arc<dyn PaymentPlanRepository>,
        accounts: Arc<dyn AccountRepository>,
        config: LoanConfig,
    ) -> Self {
        Self {
            ledger,
            plans,
            accounts,
            config,
        }
    }

    /// Run until shutdown; one cycle per tick, cycles never overlap
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.config.tick_interval(), "payment scheduler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.tick_interval()) => {
                    let today = Utc::now().date_naive();
                    match self.run_cycle(today).await {
                        Ok(summary) => info!(
                            processed = summary.processed,
                            succeeded = summary.succeeded,
                            failed = summary.failed,
                            "payment cycle complete"
                        ),
                        Err(e) => warn!(error = %e, "payment cycle failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("payment scheduler stopped");
    }

    /// Process every plan due on or before `today`
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<CycleSummary> {
        let due = self.plans.list_due(today).await?;

        let mut summary = CycleSummary {
            processed: due.len(),
            ..Default::default()
        };

        for plan in due {
            let result = self.process_plan(&plan).await;
            if result.payment_processed {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }

        Ok(summary)
    }

    /// Apply one plan's periodic payment; failures are recorded, never
    /// partially applied
    async fn process_plan(&self, plan: &PaymentPlan) -> PaymentProcessingResult {
        let failed = |error: String| PaymentProcessingResult {
            account_id: plan.account_id,
            customer_id: plan.customer_id.clone(),
            amount: None,
            payment_processed: false,
            error: Some(error),
        };

        let deposit_account = match self.locate_deposit_account(plan).await {
            Ok(Some(account_id)) => account_id,
            Ok(None) => {
                warn!(
                    account_id = %plan.account_id,
                    customer_id = %plan.customer_id,
                    "No deposit account found for scheduled payment"
                );
                return failed(format!(
                    "No deposit account in {} for customer {}",
                    plan.monthly_payment.currency(),
                    plan.customer_id
                ));
            }
            Err(e) => return failed(e.to_string()),
        };

        let transfer = NewTransfer::single_phase(
            deposit_account,
            plan.account_id,
            plan.monthly_payment,
            TransferKind::LoanPayment,
        );

        let results = match self.ledger.create_transfers(vec![transfer]).await {
            Ok(results) => results,
            Err(e) => return failed(e.to_string()),
        };
        if let Err(e) = results[0] {
            return failed(e.to_string());
        }

        match self.plans.record_payment(plan.account_id).await {
            Ok(updated) => {
                info!(
                    account_id = %plan.account_id,
                    amount = %plan.monthly_payment,
                    remaining = updated.remaining_payments,
                    "scheduled payment applied"
                );
                PaymentProcessingResult {
                    account_id: plan.account_id,
                    customer_id: plan.customer_id.clone(),
                    amount: Some(plan.monthly_payment),
                    payment_processed: true,
                    error: None,
                }
            }
            Err(e) => failed(e.to_string()),
        }
    }

    /// Locate the deposit account per the configured policy
    async fn locate_deposit_account(&self, plan: &PaymentPlan) -> Result<Option<AccountId>> {
        match self.config.deposit_policy {
            DepositAccountPolicy::PrimaryAccount => Ok(plan.primary_account_id),
            DepositAccountPolicy::OldestInCurrency => {
                let currency = plan.monthly_payment.currency();
                let deposits = self
                    .accounts
                    .list_by_customer_and_type(&plan.customer_id, AccountType::Deposit)
                    .await?;
                Ok(deposits
                    .into_iter()
                    .find(|record| record.currency == currency)
                    .map(|record| record.account_id))
            }
        }
    }
}
