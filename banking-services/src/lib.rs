//! Banking services: the composition layer of the core-banking stack
//!
//! Wires the ledger engine, metadata store, CDC pipeline, loan service,
//! payment scheduler and SEPA adapter into one service container. Holds
//! what none of the leaf crates should own: the configuration snapshot,
//! the system-account registry, customer account operations and the
//! SEPA-to-ledger suspense flow.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod accounts;
pub mod config;
pub mod container;
pub mod error;
pub mod sepa_flow;
pub mod system_accounts;

pub use accounts::AccountService;
pub use config::{init_tracing, AppConfig};
pub use container::ServiceContainer;
pub use error::{Result, ServiceError};
pub use sepa_flow::SepaFlow;
pub use system_accounts::{SystemAccountEntry, SystemAccountRegistry};
