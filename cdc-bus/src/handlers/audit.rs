//! Audit handler: append-only trail of every transfer lifecycle event
//!
//! Entries are keyed by (transfer id, event type); replaying a delivered
//! event leaves the trail unchanged. The trail answers filtered retrieval
//! and per-account compliance summaries over a date range.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use ledger_core::{AccountId, Currency, TransferEventKind, TransferId};

use crate::handlers::EventHandler;
use crate::message::EventEnvelope;
use crate::Result;

/// One audit trail entry
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Transfer the event belongs to
    pub transfer_id: TransferId,

    /// Event type
    pub kind: TransferEventKind,

    /// Commit timestamp of the event
    pub timestamp: DateTime<Utc>,

    /// Amount moved, in minor units
    pub amount_minor: i128,

    /// Currency of the amount
    pub currency: Currency,

    /// Debited account
    pub debit_account_id: AccountId,

    /// Credited account
    pub credit_account_id: AccountId,
}

/// Per-account compliance summary over a date range
#[derive(Debug, Clone)]
pub struct ComplianceSummary {
    /// Account summarized
    pub account_id: AccountId,

    /// Range start (inclusive)
    pub from: DateTime<Utc>,

    /// Range end (inclusive)
    pub to: DateTime<Utc>,

    /// Events touching the account in the range
    pub event_count: usize,

    /// Posted outflow in minor units (account on the debit side)
    pub total_debits_minor: i128,

    /// Posted inflow in minor units (account on the credit side)
    pub total_credits_minor: i128,

    /// Currency of the totals, when any entry matched
    pub currency: Option<Currency>,
}

/// Append-only audit store fed by the CDC consumer
#[derive(Default)]
pub struct AuditHandler {
    entries: DashMap<(TransferId, TransferEventKind), AuditEntry>,
}

impl AuditHandler {
    /// Create an empty audit trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries have been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for one transfer, oldest first
    pub fn entries_for_transfer(&self, transfer_id: TransferId) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .iter()
            .filter(|e| e.key().0 == transfer_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Entries touching one account inside a date range, oldest first
    pub fn entries_for_account(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .entries
            .iter()
            .filter(|e| {
                let entry = e.value();
                (entry.debit_account_id == account_id || entry.credit_account_id == account_id)
                    && entry.timestamp >= from
                    && entry.timestamp <= to
            })
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Compliance summary for one account over a date range
    ///
    /// Only posted movements (single-phase and two-phase posts) count toward
    /// the totals; reservations and releases appear in `event_count` only.
    pub fn compliance_summary(
        &self,
        account_id: AccountId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ComplianceSummary {
        let entries = self.entries_for_account(account_id, from, to);

        let mut summary = ComplianceSummary {
            account_id,
            from,
            to,
            event_count: entries.len(),
            total_debits_minor: 0,
            total_credits_minor: 0,
            currency: entries.first().map(|e| e.currency),
        };

        for entry in &entries {
            let posted = matches!(
                entry.kind,
                TransferEventKind::SinglePhase | TransferEventKind::TwoPhasePosted
            );
            if !posted {
                continue;
            }
            if entry.debit_account_id == account_id {
                summary.total_debits_minor += entry.amount_minor;
            }
            if entry.credit_account_id == account_id {
                summary.total_credits_minor += entry.amount_minor;
            }
        }

        summary
    }
}

#[async_trait]
impl EventHandler for AuditHandler {
    fn name(&self) -> &str {
        "audit"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<()> {
        let key = (envelope.transfer.id, envelope.event_type);

        // At-least-once delivery: a replay must not grow the trail.
        self.entries.entry(key).or_insert_with(|| AuditEntry {
            transfer_id: envelope.transfer.id,
            kind: envelope.event_type,
            timestamp: envelope.timestamp,
            amount_minor: envelope.transfer.amount.minor_units(),
            currency: envelope.transfer.amount.currency(),
            debit_account_id: envelope.transfer.debit_account_id,
            credit_account_id: envelope.transfer.credit_account_id,
        });

        Ok(())
    }
}
