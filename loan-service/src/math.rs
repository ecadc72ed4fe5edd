//! Loan payment math over exact integer money
//!
//! Floating point exists only in [`annuity_factor`] and [`interest_on`],
//! where the transcendental pow has no integer form. Every result is rounded
//! to minor units immediately, and [`amortization_schedule`] reconciles the
//! final row so principal portions sum exactly to the principal.

use chrono::NaiveDate;
use ledger_core::Money;
use metadata_store::{LoanType, PaymentFrequency};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{LoanError, Result};

/// One row of an amortization schedule
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    /// 1-based payment number
    pub payment_number: u32,

    /// Due date of this payment
    pub payment_date: NaiveDate,

    /// Total payment for the period
    pub payment_amount: Money,

    /// Principal portion
    pub principal_amount: Money,

    /// Interest portion
    pub interest_amount: Money,

    /// Balance remaining after this payment
    pub remaining_balance: Money,
}

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

/// Total number of payments over the term
pub fn payment_count(term_months: u32, frequency: PaymentFrequency) -> u32 {
    let months = term_months as u64;
    let count = match frequency {
        PaymentFrequency::Weekly => div_ceil(months * 52, 12),
        PaymentFrequency::BiWeekly => div_ceil(months * 26, 12),
        PaymentFrequency::Monthly => months,
    };
    count as u32
}

/// Per-period rate as a fraction (annual rate is in percent)
fn period_rate(annual_rate: Decimal, frequency: PaymentFrequency) -> f64 {
    let annual = annual_rate.to_f64().unwrap_or(0.0) / 100.0;
    annual / frequency.periods_per_year() as f64
}

/// Annuity factor `r(1+r)^n / ((1+r)^n - 1)`.
///
/// The only transcendental computation in the crate.
fn annuity_factor(rate: f64, payments: u32) -> f64 {
    let pow = (1.0 + rate).powi(payments as i32);
    rate * pow / (pow - 1.0)
}

/// Interest accrued on a balance for one period, rounded to minor units
fn interest_on(balance_minor: i128, rate: f64) -> i128 {
    (balance_minor as f64 * rate).round() as i128
}

fn validate(principal: Money, annual_rate: Decimal, term_months: u32) -> Result<()> {
    if term_months == 0 {
        return Err(LoanError::Validation("term must be positive".to_string()));
    }
    if annual_rate < Decimal::ZERO {
        return Err(LoanError::Validation(
            "interest rate must not be negative".to_string(),
        ));
    }
    if !principal.is_positive() {
        return Err(LoanError::Validation(
            "principal must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Per-period payment amount
///
/// - Annuity: `P * r(1+r)^n / ((1+r)^n - 1)`, rounded to minor units;
///   at zero rate this degenerates to `P / n` (the last scheduled payment
///   absorbs the division remainder)
/// - Serial: the first-period payment `P/n + P*r` (later payments shrink as
///   interest falls)
pub fn periodic_payment(
    principal: Money,
    annual_rate: Decimal,
    term_months: u32,
    loan_type: LoanType,
    frequency: PaymentFrequency,
) -> Result<Money> {
    validate(principal, annual_rate, term_months)?;

    let n = payment_count(term_months, frequency);
    let rate = period_rate(annual_rate, frequency);
    let principal_minor = principal.minor_units();

    let payment_minor = match loan_type {
        LoanType::Annuity => {
            if rate == 0.0 {
                principal_minor / n as i128
            } else {
                (principal_minor as f64 * annuity_factor(rate, n)).round() as i128
            }
        }
        LoanType::Serial => principal_minor / n as i128 + interest_on(principal_minor, rate),
    };

    Ok(Money::new(payment_minor, principal.currency()))
}

/// Generate the full amortization schedule
///
/// Emits at most `n` rows, stopping early once the balance reaches zero.
/// The final row is reconciled: its principal portion is exactly the
/// remaining balance, so Σ principal = principal with no drift.
pub fn amortization_schedule(
    principal: Money,
    annual_rate: Decimal,
    term_months: u32,
    loan_type: LoanType,
    frequency: PaymentFrequency,
    first_payment_date: NaiveDate,
) -> Result<Vec<ScheduleEntry>> {
    validate(principal, annual_rate, term_months)?;

    let n = payment_count(term_months, frequency);
    let rate = period_rate(annual_rate, frequency);
    let currency = principal.currency();

    let annuity_payment = match loan_type {
        LoanType::Annuity => periodic_payment(principal, annual_rate, term_months, loan_type, frequency)?
            .minor_units(),
        LoanType::Serial => 0,
    };
    let serial_base = principal.minor_units() / n as i128;

    let mut schedule = Vec::with_capacity(n as usize);
    let mut balance = principal.minor_units();
    let mut date = first_payment_date;

    for number in 1..=n {
        let interest = interest_on(balance, rate);

        let mut principal_portion = match loan_type {
            LoanType::Annuity => (annuity_payment - interest).max(0),
            LoanType::Serial => serial_base,
        };

        // Last row absorbs rounding drift and the division remainder.
        if number == n || principal_portion >= balance {
            principal_portion = balance;
        }

        balance -= principal_portion;

        schedule.push(ScheduleEntry {
            payment_number: number,
            payment_date: date,
            payment_amount: Money::new(principal_portion + interest, currency),
            principal_amount: Money::new(principal_portion, currency),
            interest_amount: Money::new(interest, currency),
            remaining_balance: Money::new(balance, currency),
        });

        if balance == 0 {
            break;
        }
        date = frequency.advance(date);
    }

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::Currency;

    fn usd(minor: i128) -> Money {
        Money::new(minor, Currency::USD)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_payment_count_by_frequency() {
        assert_eq!(payment_count(12, PaymentFrequency::Monthly), 12);
        assert_eq!(payment_count(12, PaymentFrequency::Weekly), 52);
        assert_eq!(payment_count(12, PaymentFrequency::BiWeekly), 26);
        // Ceiling division: 7 months of weekly payments is ⌈7*52/12⌉ = 31.
        assert_eq!(payment_count(7, PaymentFrequency::Weekly), 31);
        assert_eq!(payment_count(7, PaymentFrequency::BiWeekly), 16);
    }

    #[test]
    fn test_annuity_payment_reference_case() {
        // 360 monthly payments at 4.5% on 200,000: the textbook annuity
        // formula gives 1013.37 per period.
        let payment = periodic_payment(
            usd(200_000),
            Decimal::new(450, 2),
            360,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
        )
        .unwrap();
        assert_eq!(payment, usd(1013));
    }

    #[test]
    fn test_zero_rate_annuity_is_plain_division() {
        let payment = periodic_payment(
            usd(100_000),
            Decimal::ZERO,
            7,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
        )
        .unwrap();
        assert_eq!(payment, usd(14_285)); // floor(100000 / 7)
    }

    #[test]
    fn test_serial_first_payment() {
        // P/n + P*r = 100000/10 + 100000 * 0.06/12 = 10000 + 500
        let payment = periodic_payment(
            usd(100_000),
            Decimal::new(600, 2),
            10,
            LoanType::Serial,
            PaymentFrequency::Monthly,
        )
        .unwrap();
        assert_eq!(payment, usd(10_500));
    }

    #[test]
    fn test_validation_failures() {
        assert!(periodic_payment(
            usd(100_000),
            Decimal::new(450, 2),
            0,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
        )
        .is_err());

        assert!(periodic_payment(
            usd(100_000),
            Decimal::new(-1, 0),
            12,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
        )
        .is_err());

        assert!(periodic_payment(
            usd(0),
            Decimal::new(450, 2),
            12,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
        )
        .is_err());
    }

    #[test]
    fn test_annuity_schedule_closure() {
        let principal = usd(200_000);
        let schedule = amortization_schedule(
            principal,
            Decimal::new(450, 2),
            24,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        assert_eq!(schedule.len(), 24);
        let total_principal: i128 = schedule.iter().map(|e| e.principal_amount.minor_units()).sum();
        assert_eq!(total_principal, principal.minor_units());
        assert_eq!(schedule.last().unwrap().remaining_balance, usd(0));

        // Interest means payments exceed principal in total.
        let total_paid: i128 = schedule.iter().map(|e| e.payment_amount.minor_units()).sum();
        assert!(total_paid > principal.minor_units());
    }

    #[test]
    fn test_zero_rate_schedule_pays_exactly_principal() {
        let principal = usd(100_000);
        let schedule = amortization_schedule(
            principal,
            Decimal::ZERO,
            7,
            LoanType::Annuity,
            PaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        let total_paid: i128 = schedule.iter().map(|e| e.payment_amount.minor_units()).sum();
        assert_eq!(total_paid, principal.minor_units());

        // Last payment absorbs the division remainder.
        assert_eq!(schedule.last().unwrap().payment_amount, usd(14_290));
        assert_eq!(schedule.last().unwrap().remaining_balance, usd(0));
    }

    #[test]
    fn test_serial_schedule_decreasing_payments() {
        let schedule = amortization_schedule(
            usd(120_000),
            Decimal::new(600, 2),
            12,
            LoanType::Serial,
            PaymentFrequency::Monthly,
            date(2026, 9, 1),
        )
        .unwrap();

        assert_eq!(schedule.len(), 12);
        // Constant principal portion, strictly decreasing interest.
        for window in schedule.windows(2) {
            assert!(window[1].interest_amount.minor_units() < window[0].interest_amount.minor_units()
                || window[1].interest_amount.minor_units() == 0);
            assert!(window[1].payment_amount.minor_units() <= window[0].payment_amount.minor_units());
        }
        assert_eq!(
            schedule[0].principal_amount.minor_units(),
            schedule[1].principal_amount.minor_units()
        );

        let total_principal: i128 = schedule.iter().map(|e| e.principal_amount.minor_units()).sum();
        assert_eq!(total_principal, 120_000);
    }

    #[test]
    fn test_schedule_dates_follow_frequency() {
        let schedule = amortization_schedule(
            usd(10_000),
            Decimal::new(500, 2),
            2,
            LoanType::Annuity,
            PaymentFrequency::Weekly,
            date(2026, 9, 1),
        )
        .unwrap();

        assert_eq!(schedule[0].payment_date, date(2026, 9, 1));
        assert_eq!(schedule[1].payment_date, date(2026, 9, 8));
        assert_eq!(schedule[2].payment_date, date(2026, 9, 15));
    }
}
