//! Configuration for the loan service and payment scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the scheduler locates a customer's deposit account for payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositAccountPolicy {
    /// Oldest deposit account in the plan's currency
    OldestInCurrency,
    /// The plan's `primary_account_id` only
    PrimaryAccount,
}

/// Loan service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanConfig {
    /// Days until the first payment falls due after creation
    pub payment_grace_days: i64,

    /// Scheduler wake interval (seconds); monthly by default
    pub tick_interval_secs: u64,

    /// Deposit-account location policy
    pub deposit_policy: DepositAccountPolicy,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            payment_grace_days: 30,
            tick_interval_secs: 30 * 24 * 60 * 60,
            deposit_policy: DepositAccountPolicy::OldestInCurrency,
        }
    }
}

impl LoanConfig {
    /// Scheduler wake interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("SCHEDULER_TICK_INTERVAL") {
            if let Ok(secs) = secs.parse() {
                config.tick_interval_secs = secs;
            }
        }
        if let Ok(days) = std::env::var("LOAN_PAYMENT_GRACE_DAYS") {
            if let Ok(days) = days.parse() {
                config.payment_grace_days = days;
            }
        }
        if let Ok(policy) = std::env::var("SCHEDULER_DEPOSIT_POLICY") {
            match policy.as_str() {
                "oldest_in_currency" => {
                    config.deposit_policy = DepositAccountPolicy::OldestInCurrency
                }
                "primary_account" => config.deposit_policy = DepositAccountPolicy::PrimaryAccount,
                _ => {}
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoanConfig::default();
        assert_eq!(config.payment_grace_days, 30);
        assert_eq!(config.tick_interval(), Duration::from_secs(2_592_000));
        assert_eq!(config.deposit_policy, DepositAccountPolicy::OldestInCurrency);
    }
}
