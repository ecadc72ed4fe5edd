//! Metadata store contract for the core-banking services
//!
//! Account metadata, payment plans, transfer history and external-transaction
//! records live in an external relational store. This crate defines the
//! narrow repository interface the core consumes, the record types crossing
//! it (integer money as decimal strings, never floats), the versioned schema
//! the driver must apply, and an in-process implementation used by tests and
//! the demo container.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod memory;
pub mod migrations;
pub mod repository;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use repository::{
    AccountRepository, ExternalTransactionRepository, PaymentPlanRepository,
    TransferHistoryRepository,
};
pub use types::{
    AccountRecord, ExternalBankInfo, ExternalTransaction, ExternalTransactionStatus,
    ExternalTransactionType, Fee, LoanType, PaymentFrequency, PaymentPlan, TransferRecord,
};
