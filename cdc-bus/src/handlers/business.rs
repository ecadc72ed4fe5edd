//! Business handler: transfer history, invoice marking, timeout monitoring
//!
//! This handler is the sole author of the transfer-history table. Request
//! handlers never write it; rows appear only when the CDC stream confirms a
//! posted movement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use ledger_core::{TransferEventKind, TransferId, TransferKind};
use metadata_store::{TransferHistoryRepository, TransferRecord};

use crate::handlers::EventHandler;
use crate::message::EventEnvelope;
use crate::{Error, Result};

/// Invoice settlement status tracked from invoice-tagged transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    /// Payment observed but not yet posted
    PaymentPending,
    /// Payment posted
    Paid,
}

/// Business workflow handler
pub struct BusinessHandler {
    history: Arc<dyn TransferHistoryRepository>,
    invoices: DashMap<String, InvoiceStatus>,
    monitors: DashMap<TransferId, Option<DateTime<Utc>>>,
}

impl BusinessHandler {
    /// Create a handler writing history through the given repository
    pub fn new(history: Arc<dyn TransferHistoryRepository>) -> Self {
        Self {
            history,
            invoices: DashMap::new(),
            monitors: DashMap::new(),
        }
    }

    /// Status of an invoice, when any tagged transfer referenced it
    pub fn invoice_status(&self, invoice_id: &str) -> Option<InvoiceStatus> {
        self.invoices.get(invoice_id).map(|s| *s)
    }

    /// Pending transfers currently under timeout monitoring
    pub fn monitored_transfers(&self) -> Vec<TransferId> {
        self.monitors.iter().map(|e| *e.key()).collect()
    }

    fn mark_invoice(&self, envelope: &EventEnvelope) {
        if envelope.transfer.kind != TransferKind::InvoicePayment {
            return;
        }
        let Some(invoice_id) = envelope.transfer.reference.clone() else {
            return;
        };

        let status = match envelope.event_type {
            TransferEventKind::SinglePhase | TransferEventKind::TwoPhasePosted => {
                InvoiceStatus::Paid
            }
            _ => InvoiceStatus::PaymentPending,
        };

        // Paid is terminal; a late pending event must not regress it.
        self.invoices
            .entry(invoice_id.clone())
            .and_modify(|s| {
                if *s != InvoiceStatus::Paid {
                    *s = status;
                }
            })
            .or_insert(status);

        info!(invoice_id = %invoice_id, ?status, "invoice marked");
    }

    async fn record_history(&self, envelope: &EventEnvelope) -> Result<()> {
        let transfer = &envelope.transfer;
        let record = TransferRecord {
            transfer_id: transfer.id,
            from_account_id: transfer.debit_account_id,
            to_account_id: transfer.credit_account_id,
            amount: transfer.amount,
            description: transfer.reference.clone(),
            created_at: envelope.timestamp,
        };

        // Store errors bubble up so the delivery is requeued and retried.
        self.history
            .insert(record)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

#[async_trait]
impl EventHandler for BusinessHandler {
    fn name(&self) -> &str {
        "business"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        match envelope.event_type {
            TransferEventKind::SinglePhase | TransferEventKind::TwoPhasePosted => {
                self.record_history(envelope).await?;
                // A posted resolution ends monitoring of its reservation.
                if let Some(pending_id) = envelope.transfer.pending_id {
                    self.monitors.remove(&pending_id);
                }
            }
            TransferEventKind::TwoPhasePending => {
                self.monitors
                    .insert(envelope.transfer.id, envelope.transfer.timeout_at);
                debug!(transfer_id = %envelope.transfer.id, "timeout monitoring scheduled");
            }
            TransferEventKind::TwoPhaseVoided | TransferEventKind::TwoPhaseExpired => {
                let monitored = envelope
                    .transfer
                    .pending_id
                    .unwrap_or(envelope.transfer.id);
                self.monitors.remove(&monitored);
                debug!(transfer_id = %monitored, "timeout monitoring cancelled");
            }
        }

        self.mark_invoice(envelope);
        Ok(())
    }
}
