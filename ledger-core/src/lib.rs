//! Corebank ledger engine
//!
//! Strongly-consistent double-entry accounts and transfers over exact
//! integer money.
//!
//! # Architecture
//!
//! - **Single writer**: one actor task owns all state; batches apply in
//!   arrival order
//! - **Two-phase transfers**: pending reservations post, void, or expire
//!   exactly once
//! - **Append-only movements**: posted and pending counters only ever grow
//!   or release reservations; records are never mutated in place
//! - **Event emission**: every state transition hands one event to the CDC
//!   pipeline after its batch commits
//!
//! # Invariants
//!
//! - Double-entry conservation: Σ(credits − debits) per currency book is zero
//! - Posted counters are monotonic per account
//! - Every pending transfer reaches exactly one of posted/voided/expired

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod actor;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ops;
pub mod storage;
pub mod types;

mod ledger;

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use ops::{
    CreateAccountError, CreateAccountResult, CreateTransferError, CreateTransferResult, NewAccount,
    NewTransfer, TransferOp,
};
pub use storage::Storage;
pub use types::{
    Account, AccountId, AccountType, Currency, CustomerId, IdGenerator, Money, Transfer,
    TransferEvent, TransferEventKind, TransferId, TransferKind, TransferState,
};
