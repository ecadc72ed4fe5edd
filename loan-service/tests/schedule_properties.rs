//! Property-based tests for amortization reconciliation
//!
//! Across a grid of rates, terms, frequencies and principals:
//! - Σ principal portions equals the principal exactly (no drift)
//! - the final remaining balance is zero
//! - Σ payments ≥ Σ principal, with equality exactly at zero rate

use chrono::NaiveDate;
use ledger_core::{Currency, Money};
use loan_service::{amortization_schedule, payment_count};
use metadata_store::{LoanType, PaymentFrequency};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn frequency_strategy() -> impl Strategy<Value = PaymentFrequency> {
    prop_oneof![
        Just(PaymentFrequency::Weekly),
        Just(PaymentFrequency::BiWeekly),
        Just(PaymentFrequency::Monthly),
    ]
}

fn loan_type_strategy() -> impl Strategy<Value = LoanType> {
    prop_oneof![Just(LoanType::Annuity), Just(LoanType::Serial)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_schedule_closure(
        principal_minor in 1_000i128..500_000_000,
        rate_bps in 0u32..2_500, // 0.00% to 25.00% annual
        term_months in 1u32..=480,
        frequency in frequency_strategy(),
        loan_type in loan_type_strategy(),
    ) {
        let principal = Money::new(principal_minor, Currency::USD);
        let rate = Decimal::new(rate_bps as i64, 2);
        let start = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let schedule = amortization_schedule(
            principal, rate, term_months, loan_type, frequency, start,
        )
        .unwrap();

        prop_assert!(!schedule.is_empty());
        prop_assert!(schedule.len() <= payment_count(term_months, frequency) as usize);

        // Σ principal = principal, final balance zero.
        let total_principal: i128 = schedule
            .iter()
            .map(|e| e.principal_amount.minor_units())
            .sum();
        prop_assert_eq!(total_principal, principal_minor);
        prop_assert_eq!(
            schedule.last().unwrap().remaining_balance.minor_units(),
            0
        );

        // Each row decomposes exactly into principal + interest.
        for entry in &schedule {
            prop_assert_eq!(
                entry.payment_amount.minor_units(),
                entry.principal_amount.minor_units() + entry.interest_amount.minor_units()
            );
            prop_assert!(entry.principal_amount.minor_units() >= 0);
            prop_assert!(entry.interest_amount.minor_units() >= 0);
        }

        // Payments cover at least the principal; zero rate pays it exactly.
        let total_paid: i128 = schedule.iter().map(|e| e.payment_amount.minor_units()).sum();
        prop_assert!(total_paid >= principal_minor);
        if rate_bps == 0 {
            prop_assert_eq!(total_paid, principal_minor);
        }
    }

    #[test]
    fn prop_balances_never_increase(
        principal_minor in 10_000i128..10_000_000,
        rate_bps in 0u32..1_500,
        term_months in 1u32..=120,
        loan_type in loan_type_strategy(),
    ) {
        let schedule = amortization_schedule(
            Money::new(principal_minor, Currency::EUR),
            Decimal::new(rate_bps as i64, 2),
            term_months,
            loan_type,
            PaymentFrequency::Monthly,
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        )
        .unwrap();

        let mut previous = principal_minor;
        for entry in &schedule {
            let balance = entry.remaining_balance.minor_units();
            prop_assert!(balance <= previous);
            prop_assert!(balance >= 0);
            previous = balance;
        }
    }
}
