//! Change-data-capture pipeline for ledger transfer events
//!
//! Every committed transfer state transition is published to a topic
//! exchange and consumed with at-least-once delivery:
//!
//! - **Publisher**: pumps the ledger event stream onto the bus with retry
//! - **Consumer**: binds a durable queue, dispatches to typed and wildcard
//!   handlers, acks on success, nacks-with-requeue on handler failure, and
//!   sets unparseable deliveries aside
//! - **Reconnect**: explicit `Disconnected -> Connecting -> Connected ->
//!   Draining` state machine with bounded exponential backoff
//! - **Handlers**: audit trail and business workflows (transfer history,
//!   invoices, timeout monitoring), both replay-idempotent

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod consumer;
pub mod error;
pub mod handlers;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod transport;

pub use config::CdcConfig;
pub use consumer::{spawn_consumer, CdcConsumer, ConsumerState, PoisonMessage};
pub use error::{Error, Result};
pub use handlers::{
    AuditEntry, AuditHandler, BusinessHandler, ComplianceSummary, EventHandler, InvoiceStatus,
};
pub use message::EventEnvelope;
pub use publisher::{spawn_publisher, CdcPublisher, PublisherConfig};
pub use transport::{BusTransport, Delivery, MemoryBroker};
