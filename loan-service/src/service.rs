//! Loan lifecycle: creation, funding and disbursement
//!
//! A loan account is funded at creation from the per-currency equity account
//! for principal plus fees; the payment plan is persisted alongside it. The
//! scheduler ([`crate::scheduler`]) later drives payments through the same
//! ledger handle.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use ledger_core::actor::LedgerHandle;
use ledger_core::{
    AccountId, AccountType, Currency, CustomerId, Money, NewAccount, NewTransfer, TransferId,
    TransferKind,
};
use metadata_store::{
    AccountRecord, AccountRepository, Fee, LoanType, PaymentFrequency, PaymentPlan,
    PaymentPlanRepository,
};

use crate::config::LoanConfig;
use crate::error::{LoanError, Result};
use crate::math;

/// Source of the per-currency system equity accounts funding new loans
pub trait EquitySource: Send + Sync {
    /// Equity account for a currency book, when configured
    fn equity_account(&self, currency: Currency) -> Option<AccountId>;
}

/// Parameters for a new loan
#[derive(Debug, Clone)]
pub struct CreateLoanRequest {
    /// Borrowing customer
    pub customer_id: CustomerId,

    /// Principal amount
    pub principal: Money,

    /// Annual interest rate in percent (scaled decimal)
    pub annual_rate: Decimal,

    /// Term in months
    pub term_months: u32,

    /// Loan type
    pub loan_type: LoanType,

    /// Payment frequency
    pub payment_frequency: PaymentFrequency,

    /// Origination fees, added to the funded amount
    pub fees: Vec<Fee>,

    /// Optional nickname for the loan account
    pub nickname: Option<String>,

    /// Designated deposit account for scheduled payments (primary-account
    /// policy)
    pub primary_account_id: Option<AccountId>,
}

/// Result of a successful loan creation
#[derive(Debug, Clone)]
pub struct LoanCreated {
    /// The funded loan account
    pub account_id: AccountId,

    /// The persisted payment plan
    pub plan: PaymentPlan,
}

/// Loan service
pub struct LoanService {
    ledger: LedgerHandle,
    plans: Arc<dyn PaymentPlanRepository>,
    accounts: Arc<dyn AccountRepository>,
    equity: Arc<dyn EquitySource>,
    config: LoanConfig,
}

impl LoanService {
    /// Create a loan service over its collaborators
    pub fn new(
        ledger: LedgerHandle,
        plans: Arc<dyn PaymentPlanRepository>,
        accounts: Arc<dyn AccountRepository>,
        equity: Arc<dyn EquitySource>,
        config: LoanConfig,
    ) -> Self {
        Self {
            ledger,
            plans,
            accounts,
            equity,
            config,
        }
    }

    /// Create and fund a loan, persisting its payment plan
    pub async fn create_loan(&self, request: CreateLoanRequest) -> Result<LoanCreated> {
        let currency = request.principal.currency();

        // Total owed is principal plus every fee; mixed-currency fees fail.
        let total = request
            .fees
            .iter()
            .try_fold(request.principal, |acc, fee| acc.checked_add(&fee.amount))
            .map_err(|e| LoanError::Validation(e.to_string()))?;

        // Per-period payment is computed on the full funded amount; this
        // also validates term and rate.
        let payment = math::periodic_payment(
            total,
            request.annual_rate,
            request.term_months,
            request.loan_type,
            request.payment_frequency,
        )?;
        let remaining_payments =
            math::payment_count(request.term_months, request.payment_frequency);

        let equity_account = self
            .equity
            .equity_account(currency)
            .ok_or_else(|| LoanError::Validation(format!("no equity account for {}", currency)))?;

        let results = self
            .ledger
            .create_accounts(vec![NewAccount::for_type(currency, AccountType::Loan)
                .with_user_tag(request.customer_id.as_str())])
            .await?;
        let account_id = results[0]
            .map_err(|e| LoanError::Validation(format!("loan account rejected: {}", e)))?;

        // Fund the loan account with the full amount from equity.
        let results = self
            .ledger
            .create_transfers(vec![NewTransfer::single_phase(
                equity_account,
                account_id,
                total,
                TransferKind::LoanFunding,
            )])
            .await?;
        results[0].map_err(LoanError::Transfer)?;

        let now = Utc::now();
        let next_payment_date = (now + Duration::days(self.config.payment_grace_days)).date_naive();

        self.accounts
            .upsert(AccountRecord {
                account_id,
                customer_id: request.customer_id.clone(),
                account_type: AccountType::Loan,
                currency,
                account_name: request.nickname.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        let plan = PaymentPlan {
            account_id,
            customer_id: request.customer_id.clone(),
            principal: request.principal,
            interest_rate: request.annual_rate,
            term_months: request.term_months,
            loan_type: request.loan_type,
            payment_frequency: request.payment_frequency,
            fees: request.fees.clone(),
            total_loan_amount: total,
            monthly_payment: payment,
            remaining_payments,
            next_payment_date,
            primary_account_id: request.primary_account_id,
            created_at: now,
            updated_at: now,
        };
        self.plans.upsert(plan.clone()).await?;

        info!(
            account_id = %account_id,
            customer_id = %request.customer_id,
            total = %total,
            payment = %payment,
            payments = remaining_payments,
            "loan created"
        );

        Ok(LoanCreated { account_id, plan })
    }

    /// Pay out loan funds to a deposit account
    ///
    /// `amount` defaults to the loan account's full available balance.
    pub async fn disburse(
        &self,
        loan_account_id: AccountId,
        deposit_account_id: AccountId,
        amount: Option<Money>,
    ) -> Result<TransferId> {
        let mut lookups = self
            .ledger
            .lookup_accounts(vec![loan_account_id, deposit_account_id])
            .await?;

        let deposit = lookups
            .pop()
            .flatten()
            .ok_or_else(|| LoanError::AccountNotFound(deposit_account_id.to_string()))?;
        let loan = lookups
            .pop()
            .flatten()
            .ok_or_else(|| LoanError::AccountNotFound(loan_account_id.to_string()))?;

        if loan.account_type != AccountType::Loan {
            return Err(LoanError::AccountTypeInvalid {
                expected: "LOAN",
                found: loan.account_type.to_string(),
            });
        }
        if deposit.account_type != AccountType::Deposit {
            return Err(LoanError::AccountTypeInvalid {
                expected: "DEPOSIT",
                found: deposit.account_type.to_string(),
            });
        }

        let available = loan.available();
        let amount = match amount {
            Some(amount) => {
                if !amount.is_positive() {
                    return Err(LoanError::AmountNonPositive);
                }
                if amount.currency() != loan.currency {
                    return Err(LoanError::Transfer(
                        ledger_core::CreateTransferError::LedgerMismatch,
                    ));
                }
                amount
            }
            None => Money::new(available, loan.currency),
        };

        if amount.minor_units() > available {
            return Err(LoanError::InsufficientLoanFunds {
                requested: amount.minor_units(),
                available,
            });
        }
        if !amount.is_positive() {
            return Err(LoanError::InsufficientLoanFunds {
                requested: amount.minor_units(),
                available,
            });
        }

        let results = self
            .ledger
            .create_transfers(vec![NewTransfer::single_phase(
                loan_account_id,
                deposit_account_id,
                amount,
                TransferKind::LoanDisbursement,
            )])
            .await?;

        let transfer_id = results[0].map_err(|e| match e {
            ledger_core::CreateTransferError::InsufficientFunds => {
                LoanError::InsufficientLoanFunds {
                    requested: amount.minor_units(),
                    available,
                }
            }
            other => LoanError::Transfer(other),
        })?;

        info!(
            loan = %loan_account_id,
            deposit = %deposit_account_id,
            amount = %amount,
            "loan disbursed"
        );

        Ok(transfer_id)
    }
}
