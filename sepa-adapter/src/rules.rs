//! Business rules gating SEPA acceptance
//!
//! All rules are pure functions over an explicit `now`, so tests pin the
//! clock instead of racing it.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SepaError};
use crate::types::SepaUrgency;

/// Per-bank response behavior, keyed by creditor BIC
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BankResponseConfig {
    /// Whether the bank accepts messages at all
    pub accepts: bool,

    /// Probability of a spurious rejection
    pub error_rate: f64,
}

impl Default for BankResponseConfig {
    fn default() -> Self {
        Self {
            accepts: true,
            error_rate: 0.0,
        }
    }
}

/// True for Saturday and Sunday
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First business day strictly after `date`
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while is_weekend(next) {
        next += Duration::days(1);
    }
    next
}

/// Express messages close at the cut-off hour
pub fn check_cut_off(urgency: SepaUrgency, now: DateTime<Utc>, cut_off_hour: u32) -> Result<()> {
    if urgency == SepaUrgency::Express && now.hour() >= cut_off_hour {
        return Err(SepaError::CutOffTimeExceeded);
    }
    Ok(())
}

/// Non-instant messages are not processed on weekends
pub fn check_weekend(
    urgency: SepaUrgency,
    now: DateTime<Utc>,
    simulate_weekends: bool,
) -> Result<()> {
    if simulate_weekends && urgency != SepaUrgency::Instant && is_weekend(now.date_naive()) {
        return Err(SepaError::HolidayProcessing);
    }
    Ok(())
}

/// Estimated settlement time for an accepted message
///
/// Instant: +10 s. Express: +2 h. Standard: next business day. Non-instant
/// estimates landing on a weekend roll forward to the next business day.
pub fn estimate_settlement(urgency: SepaUrgency, now: DateTime<Utc>) -> DateTime<Utc> {
    match urgency {
        SepaUrgency::Instant => now + Duration::seconds(10),
        SepaUrgency::Express => {
            let mut estimate = now + Duration::hours(2);
            while is_weekend(estimate.date_naive()) {
                estimate += Duration::days(1);
            }
            estimate
        }
        SepaUrgency::Standard => {
            let date = next_business_day(now.date_naive());
            DateTime::from_naive_utc_and_offset(date.and_time(now.time()), Utc)
        }
    }
}
