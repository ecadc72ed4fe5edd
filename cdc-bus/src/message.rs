//! CDC wire format
//!
//! One JSON message per transfer lifecycle change. The routing key equals
//! the event type; 128-bit money and id fields ride as decimal strings.

use chrono::{DateTime, Utc};
use ledger_core::{Account, Transfer, TransferEvent, TransferEventKind};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Envelope published for every transfer state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event type; doubles as the routing key
    #[serde(rename = "type")]
    pub event_type: TransferEventKind,

    /// Commit timestamp (ISO 8601 on the wire)
    pub timestamp: DateTime<Utc>,

    /// Full transfer record after the transition
    pub transfer: Transfer,

    /// Debit account snapshot at commit time
    pub debit_account: Account,

    /// Credit account snapshot at commit time
    pub credit_account: Account,

    /// Both snapshots again as an array, for consumers that iterate
    pub accounts: Vec<Account>,
}

impl EventEnvelope {
    /// Build the envelope for a committed ledger event
    pub fn from_event(event: &TransferEvent) -> Self {
        Self {
            event_type: event.kind,
            timestamp: event.timestamp,
            transfer: event.transfer.clone(),
            debit_account: event.debit_account.clone(),
            credit_account: event.credit_account.clone(),
            accounts: vec![event.debit_account.clone(), event.credit_account.clone()],
        }
    }

    /// Routing key for topic-exchange publication
    pub fn routing_key(&self) -> &'static str {
        self.event_type.as_str()
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from wire bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
