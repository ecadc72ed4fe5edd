//! End-to-end scenarios across the full service container

use std::sync::Arc;
use std::time::Duration;

use banking_services::{AppConfig, ServiceContainer};
use cdc_bus::AuditHandler;
use ledger_core::{
    AccountType, CreateTransferError, Currency, CustomerId, Money, NewTransfer, TransferEventKind,
    TransferId, TransferKind,
};
use loan_service::{CreateLoanRequest, DepositAccountPolicy};
use metadata_store::{
    ExternalTransactionRepository, ExternalTransactionStatus, LoanType, PaymentFrequency,
    PaymentPlanRepository, TransferHistoryRepository,
};
use rust_decimal::Decimal;
use sepa_adapter::{
    rules, SepaDirection, SepaMessage, SepaResponseStatus, SepaTransferState, SepaUrgency,
};

async fn container(temp: &tempfile::TempDir) -> ServiceContainer {
    let mut config = AppConfig::default();
    config.ledger.data_dir = temp.path().join("ledger");
    config.system_accounts_path = temp.path().join("system-accounts.json");
    config.sepa.daily_cap_minor = 20_000;
    config.sepa.max_transaction_cap_minor = 15_000;
    config.sepa.simulate_weekends = false;
    config.loan.deposit_policy = DepositAccountPolicy::OldestInCurrency;

    ServiceContainer::init(config).await.unwrap()
}

fn customer() -> CustomerId {
    CustomerId::new("CUSTOMER-ABC-123").unwrap()
}

fn usd(minor: i128) -> Money {
    Money::new(minor, Currency::USD)
}

/// Poll until the audit trail has seen `count` events for the transfer
async fn await_audit(audit: &Arc<AuditHandler>, transfer_id: TransferId, count: usize) {
    for _ in 0..500 {
        if audit.entries_for_transfer(transfer_id).len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("audit trail never saw {} events for {}", count, transfer_id);
}

#[tokio::test(start_paused = true)]
async fn scenario_deposit_and_transfer() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    let a = c
        .accounts
        .open_account(customer(), AccountType::Deposit, Currency::USD, None, Some(usd(50000)))
        .await
        .unwrap();
    let b = c
        .accounts
        .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
        .await
        .unwrap();

    let transfer_id = c.accounts.transfer(a, b, usd(3000), None).await.unwrap();

    assert_eq!(c.accounts.balance(a).await.unwrap(), usd(47000));
    assert_eq!(c.accounts.balance(b).await.unwrap(), usd(3000));

    // Exactly one single_phase event reaches the CDC handlers.
    await_audit(&c.audit, transfer_id, 1).await;
    let entries = c.audit.entries_for_transfer(transfer_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, TransferEventKind::SinglePhase);
    assert_eq!(entries[0].amount_minor, 3000);

    // The business handler wrote the history row (sole author).
    let history = TransferHistoryRepository::list_by_account(c.store.as_ref(), b, 10)
        .await
        .unwrap();
    assert!(history.iter().any(|r| r.transfer_id == transfer_id));

    c.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scenario_loan_disbursement() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    let created = c
        .loans
        .create_loan(CreateLoanRequest {
            customer_id: customer(),
            principal: usd(200_000),
            annual_rate: Decimal::new(450, 2),
            term_months: 360,
            loan_type: LoanType::Annuity,
            payment_frequency: PaymentFrequency::Monthly,
            fees: vec![],
            nickname: Some("House".to_string()),
            primary_account_id: None,
        })
        .await
        .unwrap();

    let deposit = c
        .accounts
        .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
        .await
        .unwrap();

    c.loans.disburse(created.account_id, deposit, None).await.unwrap();

    assert_eq!(c.accounts.balance(created.account_id).await.unwrap(), usd(0));
    assert_eq!(c.accounts.balance(deposit).await.unwrap(), usd(200_000));

    // M = round(200000 * r(1+r)^360 / ((1+r)^360 - 1)) with r = 0.045/12
    assert_eq!(created.plan.monthly_payment, usd(1013));
    assert_eq!(created.plan.remaining_payments, 360);

    c.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scenario_scheduled_payment_missing_deposit() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    // A loan whose first payment is due immediately; the customer has no
    // deposit account at all.
    let created = c
        .loans
        .create_loan(CreateLoanRequest {
            customer_id: customer(),
            principal: usd(120_000),
            annual_rate: Decimal::new(600, 2),
            term_months: 12,
            loan_type: LoanType::Annuity,
            payment_frequency: PaymentFrequency::Monthly,
            fees: vec![],
            nickname: None,
            primary_account_id: None,
        })
        .await
        .unwrap();

    let due_today = chrono::Utc::now().date_naive();
    PaymentPlanRepository::set_next_payment_date(c.store.as_ref(), created.account_id, due_today)
        .await
        .unwrap();

    let summary = c.scheduler.run_cycle(due_today).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let result = &summary.results[0];
    assert!(!result.payment_processed);
    assert!(result.error.as_ref().unwrap().contains("No deposit account"));

    // Plan untouched.
    let plan = PaymentPlanRepository::get(c.store.as_ref(), created.account_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(plan.remaining_payments, created.plan.remaining_payments);

    c.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scenario_two_phase_post() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    let a = c
        .accounts
        .open_account(customer(), AccountType::Deposit, Currency::USD, None, Some(usd(50000)))
        .await
        .unwrap();
    let b = c
        .accounts
        .open_account(customer(), AccountType::Deposit, Currency::USD, None, None)
        .await
        .unwrap();

    let ledger = c.ledger.handle();
    let amount = usd(10000);

    let results = ledger
        .create_transfers(vec![NewTransfer::pending(
            a,
            b,
            amount,
            TransferKind::CustomerTransfer,
        )])
        .await
        .unwrap();
    let pending_id = results[0].unwrap();

    let account = ledger.lookup_accounts(vec![a]).await.unwrap()[0].clone().unwrap();
    assert_eq!(account.debits_pending, 10000);
    assert_eq!(account.debits_posted, 0);

    let results = ledger
        .create_transfers(vec![NewTransfer::post(
            pending_id,
            amount,
            TransferKind::CustomerTransfer,
        )])
        .await
        .unwrap();
    assert!(results[0].is_ok());

    let account = ledger.lookup_accounts(vec![a]).await.unwrap()[0].clone().unwrap();
    assert_eq!(account.debits_posted, 10000);
    assert_eq!(account.debits_pending, 0);

    // Any further resolution of the same reservation is rejected.
    for spec in [
        NewTransfer::post(pending_id, amount, TransferKind::CustomerTransfer),
        NewTransfer::void(pending_id, amount, TransferKind::CustomerTransfer),
    ] {
        let results = ledger.create_transfers(vec![spec]).await.unwrap();
        assert_eq!(results[0], Err(CreateTransferError::PendingAlreadyResolved));
    }

    c.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scenario_sepa_accept_and_settle() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    let account = c
        .accounts
        .open_account(
            customer(),
            AccountType::Deposit,
            Currency::EUR,
            None,
            Some(Money::new(50_000, Currency::EUR)),
        )
        .await
        .unwrap();

    let response = c
        .sepa_flow
        .send_outgoing(
            account,
            SepaMessage {
                direction: SepaDirection::Outgoing,
                amount: Money::new(10_000, Currency::EUR),
                debtor_iban: "DE89370400440532013000".to_string(),
                creditor_iban: "FR1420041010050500013M02606".to_string(),
                debtor_bic: None,
                creditor_bic: None,
                urgency: SepaUrgency::Standard,
                description: Some("invoice 44".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.status, SepaResponseStatus::Accepted);

    // Transaction id matches SEPA_OUT_EUR_<millis>_<suffix>.
    let id = response.sepa_transaction_id.unwrap();
    let rest = id.strip_prefix("SEPA_OUT_EUR_").unwrap();
    let (millis, suffix) = rest.split_once('_').unwrap();
    assert!(millis.chars().all(|c| c.is_ascii_digit()));
    assert!(!suffix.is_empty());
    assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    // Standard urgency: next business day.
    let estimated = response.estimated_settlement.unwrap();
    assert_eq!(
        estimated.date_naive(),
        rules::next_business_day(chrono::Utc::now().date_naive())
    );

    // The customer account was debited into the out-suspense account.
    assert_eq!(
        c.accounts.balance(account).await.unwrap(),
        Money::new(40_000, Currency::EUR)
    );
    let suspense = c.registry.sepa_out_suspense(Currency::EUR).unwrap();
    let suspense_balance = c.accounts.balance(suspense).await.unwrap();
    assert_eq!(suspense_balance, Money::new(10_000, Currency::EUR));

    assert_eq!(
        c.sepa_flow.sync_settlement(&id).await.unwrap(),
        ExternalTransactionStatus::Pending
    );

    // Jump past the settlement estimate (paused clock).
    tokio::time::sleep(Duration::from_secs(4 * 24 * 60 * 60)).await;

    assert_eq!(c.sepa.transfer(&id).unwrap().state, SepaTransferState::Settled);
    assert_eq!(
        c.sepa_flow.sync_settlement(&id).await.unwrap(),
        ExternalTransactionStatus::Settled
    );

    let record = ExternalTransactionRepository::get(c.store.as_ref(), &id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ExternalTransactionStatus::Settled);

    c.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scenario_sepa_daily_cap() {
    let temp = tempfile::tempdir().unwrap();
    let c = container(&temp).await;

    let account = c
        .accounts
        .open_account(
            customer(),
            AccountType::Deposit,
            Currency::EUR,
            None,
            Some(Money::new(100_000, Currency::EUR)),
        )
        .await
        .unwrap();

    let message = |amount: i128| SepaMessage {
        direction: SepaDirection::Outgoing,
        amount: Money::new(amount, Currency::EUR),
        debtor_iban: "DE89370400440532013000".to_string(),
        creditor_iban: "FR1420041010050500013M02606".to_string(),
        debtor_bic: None,
        creditor_bic: None,
        urgency: SepaUrgency::Standard,
        description: None,
    };

    // Daily cap is 20000: 15000 accepted, then 10000 rejected.
    let first = c.sepa_flow.send_outgoing(account, message(15_000)).await.unwrap();
    assert_eq!(first.status, SepaResponseStatus::Accepted);

    let second = c.sepa_flow.send_outgoing(account, message(10_000)).await.unwrap();
    assert_eq!(second.status, SepaResponseStatus::Rejected);
    assert_eq!(
        second.error,
        Some(sepa_adapter::SepaError::AmountLimitExceeded)
    );

    // Only the accepted amount left the customer account.
    assert_eq!(
        c.accounts.balance(account).await.unwrap(),
        Money::new(85_000, Currency::EUR)
    );

    c.shutdown().await.unwrap();
}
