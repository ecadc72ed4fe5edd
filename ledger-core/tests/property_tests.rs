//! Property-based tests for ledger invariants
//!
//! - Double-entry conservation: Σ(credits − debits) per currency book is zero
//! - Monotonic posted totals: counters never decrease
//! - Pending-posted consistency: counters equal the sum of transfers
//!   referencing the account in the corresponding direction
//! - Two-phase terminality: exactly one terminal transition per reservation

use ledger_core::{
    Config, CreateTransferError, Ledger, Money, NewAccount, NewTransfer, TransferKind,
    TransferState,
};
use ledger_core::{AccountId, AccountType, Currency};
use proptest::prelude::*;

/// One randomized transfer step over a fixed account set
#[derive(Debug, Clone)]
struct Step {
    debit: usize,
    credit: usize,
    amount: i128,
    two_phase: bool,
    resolve_post: bool,
}

fn step_strategy(accounts: usize) -> impl Strategy<Value = Step> {
    (
        0..accounts,
        0..accounts,
        1i128..50_000,
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(debit, credit, amount, two_phase, resolve_post)| Step {
            debit,
            credit,
            amount,
            two_phase,
            resolve_post,
        })
        .prop_filter("distinct accounts", |s| s.debit != s.credit)
}

async fn create_test_ledger() -> (Ledger, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (Ledger::open(config).await.unwrap(), temp_dir)
}

/// Build one suspense funding account plus three deposits, all USD, with
/// generous opening balances on the deposits.
async fn funded_accounts(ledger: &Ledger) -> Vec<AccountId> {
    let mut specs = vec![NewAccount::for_type(Currency::USD, AccountType::Suspense)];
    specs.extend(
        std::iter::repeat_with(|| NewAccount::for_type(Currency::USD, AccountType::Deposit))
            .take(3),
    );

    let ids: Vec<AccountId> = ledger
        .create_accounts(specs)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let funding: Vec<NewTransfer> = ids[1..]
        .iter()
        .map(|deposit| {
            NewTransfer::single_phase(
                ids[0],
                *deposit,
                Money::new(10_000_000, Currency::USD),
                TransferKind::InitialFunding,
            )
        })
        .collect();
    ledger.create_transfers(funding).await.unwrap();

    ids
}

async fn apply_steps(ledger: &Ledger, accounts: &[AccountId], steps: &[Step]) {
    for step in steps {
        let debit = accounts[step.debit];
        let credit = accounts[step.credit];
        let amount = Money::new(step.amount, Currency::USD);

        if step.two_phase {
            let results = ledger
                .create_transfers(vec![NewTransfer::pending(
                    debit,
                    credit,
                    amount,
                    TransferKind::CustomerTransfer,
                )])
                .await
                .unwrap();

            if let Ok(pending_id) = results[0] {
                let resolution = if step.resolve_post {
                    NewTransfer::post(pending_id, amount, TransferKind::CustomerTransfer)
                } else {
                    NewTransfer::void(pending_id, amount, TransferKind::CustomerTransfer)
                };
                let resolved = ledger.create_transfers(vec![resolution]).await.unwrap();
                assert!(resolved[0].is_ok());
            }
        } else {
            // Insufficient funds is an acceptable per-entry outcome.
            let results = ledger
                .create_transfers(vec![NewTransfer::single_phase(
                    debit,
                    credit,
                    amount,
                    TransferKind::CustomerTransfer,
                )])
                .await
                .unwrap();
            if let Err(e) = results[0] {
                assert_eq!(e, CreateTransferError::InsufficientFunds);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Property: Σ(credits_posted − debits_posted) over all accounts is zero
    /// after any sequence of valid operations, and no pending reservations
    /// leak once every reservation is resolved.
    #[test]
    fn prop_double_entry_conservation(steps in prop::collection::vec(step_strategy(4), 1..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let accounts = funded_accounts(&ledger).await;

            apply_steps(&ledger, &accounts, &steps).await;

            let snapshots = ledger.lookup_accounts(accounts.clone()).await.unwrap();
            let mut sum: i128 = 0;
            for account in snapshots.iter().flatten() {
                sum += account.balance();
                prop_assert_eq!(account.debits_pending, 0);
                prop_assert_eq!(account.credits_pending, 0);
            }
            prop_assert_eq!(sum, 0);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: posted counters never decrease across a sequence of steps.
    #[test]
    fn prop_monotonic_posted_totals(steps in prop::collection::vec(step_strategy(4), 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let accounts = funded_accounts(&ledger).await;

            let mut previous: Vec<(u128, u128)> = ledger
                .lookup_accounts(accounts.clone())
                .await
                .unwrap()
                .into_iter()
                .map(|a| {
                    let a = a.unwrap();
                    (a.debits_posted, a.credits_posted)
                })
                .collect();

            for step in &steps {
                apply_steps(&ledger, &accounts, std::slice::from_ref(step)).await;

                let current: Vec<(u128, u128)> = ledger
                    .lookup_accounts(accounts.clone())
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|a| {
                        let a = a.unwrap();
                        (a.debits_posted, a.credits_posted)
                    })
                    .collect();

                for (prev, curr) in previous.iter().zip(&current) {
                    prop_assert!(curr.0 >= prev.0);
                    prop_assert!(curr.1 >= prev.1);
                }
                previous = current;
            }

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: pending + posted counters equal the sum of transfers
    /// referencing the account in the corresponding direction.
    #[test]
    fn prop_pending_posted_consistency(steps in prop::collection::vec(step_strategy(4), 1..25)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let accounts = funded_accounts(&ledger).await;

            let mut transfer_ids = Vec::new();
            for step in &steps {
                let debit = accounts[step.debit];
                let credit = accounts[step.credit];
                let amount = Money::new(step.amount, Currency::USD);

                let spec = if step.two_phase {
                    NewTransfer::pending(debit, credit, amount, TransferKind::CustomerTransfer)
                } else {
                    NewTransfer::single_phase(debit, credit, amount, TransferKind::CustomerTransfer)
                };
                let results = ledger.create_transfers(vec![spec]).await.unwrap();
                if let Ok(id) = results[0] {
                    transfer_ids.push(id);
                }
            }

            // Recompute expected counters from the transfer log.
            let transfers = ledger.lookup_transfers(transfer_ids).await.unwrap();
            let mut expected: std::collections::HashMap<AccountId, (u128, u128, u128, u128)> =
                accounts.iter().map(|id| (*id, (0, 0, 0, 0))).collect();

            for transfer in transfers.iter().flatten() {
                let amount = transfer.amount.minor_units() as u128;
                match transfer.state {
                    TransferState::SinglePhase => {
                        expected.get_mut(&transfer.debit_account_id).unwrap().0 += amount;
                        expected.get_mut(&transfer.credit_account_id).unwrap().1 += amount;
                    }
                    TransferState::TwoPhasePending => {
                        expected.get_mut(&transfer.debit_account_id).unwrap().2 += amount;
                        expected.get_mut(&transfer.credit_account_id).unwrap().3 += amount;
                    }
                    _ => {}
                }
            }

            for account in ledger
                .lookup_accounts(accounts.clone())
                .await
                .unwrap()
                .into_iter()
                .flatten()
            {
                // Skip the suspense funding counters: opening balances are
                // not part of the recorded step transfers.
                if account.account_type == AccountType::Suspense {
                    continue;
                }
                let (debits, credits, debits_pending, credits_pending) = expected[&account.id];
                prop_assert_eq!(account.debits_posted, debits);
                // Opening funding credited each deposit 10_000_000.
                prop_assert_eq!(account.credits_posted, credits + 10_000_000);
                prop_assert_eq!(account.debits_pending, debits_pending);
                prop_assert_eq!(account.credits_pending, credits_pending);
            }

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: a resolved pending transfer rejects any further resolution.
    #[test]
    fn prop_two_phase_terminality(amount in 1i128..100_000, post_first in any::<bool>()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let accounts = funded_accounts(&ledger).await;

            let money = Money::new(amount, Currency::USD);
            let results = ledger
                .create_transfers(vec![NewTransfer::pending(
                    accounts[1],
                    accounts[2],
                    money,
                    TransferKind::CustomerTransfer,
                )])
                .await
                .unwrap();
            let pending_id = results[0].unwrap();

            let first = if post_first {
                NewTransfer::post(pending_id, money, TransferKind::CustomerTransfer)
            } else {
                NewTransfer::void(pending_id, money, TransferKind::CustomerTransfer)
            };
            let results = ledger.create_transfers(vec![first]).await.unwrap();
            prop_assert!(results[0].is_ok());

            for second in [
                NewTransfer::post(pending_id, money, TransferKind::CustomerTransfer),
                NewTransfer::void(pending_id, money, TransferKind::CustomerTransfer),
            ] {
                let results = ledger.create_transfers(vec![second]).await.unwrap();
                prop_assert_eq!(
                    results[0],
                    Err(CreateTransferError::PendingAlreadyResolved)
                );
            }

            let state = ledger.get_transfer(pending_id).await.unwrap().unwrap().state;
            if post_first {
                prop_assert_eq!(state, TransferState::TwoPhasePosted);
            } else {
                prop_assert_eq!(state, TransferState::TwoPhaseVoided);
            }

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: within one batch, entries apply in arrival order, so a
    /// balance-draining prefix starves identical later entries.
    #[test]
    fn prop_batch_fifo_determinism(amount in 1i128..100_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _temp) = create_test_ledger().await;
            let accounts = funded_accounts(&ledger).await;

            // Deposit holds 10_000_000: the drain entry takes everything,
            // the follow-up entry must fail regardless of amount.
            let drain = NewTransfer::single_phase(
                accounts[1],
                accounts[2],
                Money::new(10_000_000, Currency::USD),
                TransferKind::CustomerTransfer,
            );
            let follow_up = NewTransfer::single_phase(
                accounts[1],
                accounts[2],
                Money::new(amount, Currency::USD),
                TransferKind::CustomerTransfer,
            );

            let results = ledger
                .create_transfers(vec![drain, follow_up])
                .await
                .unwrap();
            prop_assert!(results[0].is_ok());
            prop_assert_eq!(results[1], Err(CreateTransferError::InsufficientFunds));

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }
}
