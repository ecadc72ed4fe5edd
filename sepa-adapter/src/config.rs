//! Configuration for the SEPA adapter

use serde::{Deserialize, Serialize};

/// SEPA business-rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SepaConfig {
    /// Daily cap per currency, minor units, summed over accepted amounts
    /// per UTC date
    pub daily_cap_minor: i128,

    /// Per-transaction cap, minor units
    pub max_transaction_cap_minor: i128,

    /// Express cut-off hour (local wall clock, 24h)
    pub cut_off_hour: u32,

    /// Reject non-instant messages on Saturdays and Sundays
    pub simulate_weekends: bool,

    /// Probability that a scheduled settlement fails in transport
    pub settlement_failure_rate: f64,
}

impl Default for SepaConfig {
    fn default() -> Self {
        Self {
            daily_cap_minor: 100_000_00,
            max_transaction_cap_minor: 50_000_00,
            cut_off_hour: 15,
            simulate_weekends: true,
            settlement_failure_rate: 0.0,
        }
    }
}

impl SepaConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(cap) = std::env::var("SEPA_DAILY_CAP") {
            if let Ok(cap) = cap.parse() {
                config.daily_cap_minor = cap;
            }
        }
        if let Ok(cap) = std::env::var("SEPA_MAX_TRANSACTION_CAP") {
            if let Ok(cap) = cap.parse() {
                config.max_transaction_cap_minor = cap;
            }
        }
        if let Ok(hour) = std::env::var("SEPA_CUT_OFF_HOUR") {
            if let Ok(hour) = hour.parse() {
                config.cut_off_hour = hour;
            }
        }
        if let Ok(flag) = std::env::var("SEPA_SIMULATE_WEEKENDS") {
            config.simulate_weekends = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        config
    }
}
