//! Loan amortization and scheduled-payment engine
//!
//! - Deterministic financial math over exact integer money (annuity and
//!   serial amortization, schedule generation with last-row reconciliation)
//! - Loan creation funded from per-currency equity accounts
//! - Disbursement into deposit accounts
//! - A periodic scheduler that finds due plans and applies payments through
//!   the ledger engine, idempotently per cycle and without overlap

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod math;
pub mod scheduler;
pub mod service;

pub use config::{DepositAccountPolicy, LoanConfig};
pub use error::{LoanError, Result};
pub use math::{amortization_schedule, payment_count, periodic_payment, ScheduleEntry};
pub use scheduler::{CycleSummary, PaymentProcessingResult, PaymentScheduler};
pub use service::{CreateLoanRequest, EquitySource, LoanCreated, LoanService};
