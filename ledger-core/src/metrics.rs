//! Prometheus metrics for the ledger engine

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    /// Account creation entries processed
    pub static ref LEDGER_ACCOUNTS_TOTAL: CounterVec = register_counter_vec!(
        "ledger_accounts_total",
        "Account creation entries processed",
        &["status"]
    )
    .unwrap();

    /// Transfer entries processed
    pub static ref LEDGER_TRANSFERS_TOTAL: CounterVec = register_counter_vec!(
        "ledger_transfers_total",
        "Transfer entries processed",
        &["status"]
    )
    .unwrap();
}
