//! Event handlers dispatched by the CDC consumer
//!
//! Handlers must be idempotent keyed by (transfer id, event type): the bus
//! delivers at least once, so the same event may arrive again.

use async_trait::async_trait;

use crate::message::EventEnvelope;
use crate::Result;

mod audit;
mod business;

pub use audit::{AuditEntry, AuditHandler, ComplianceSummary};
pub use business::{BusinessHandler, InvoiceStatus};

/// Handler invoked for delivered transfer events
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handler name, used in failure reporting
    fn name(&self) -> &str;

    /// Process one event; an error requeues the delivery
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()>;
}
