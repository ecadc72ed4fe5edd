//! CDC publisher with retry logic
//!
//! Pumps the ledger's post-commit event stream onto the bus. Publish
//! failures retry with exponential backoff; per-transfer order is preserved
//! because the pump is a single task over an ordered channel.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use ledger_core::TransferEvent;

use crate::message::EventEnvelope;
use crate::metrics::{CDC_PUBLISH_DURATION, CDC_PUBLISH_TOTAL};
use crate::transport::BusTransport;
use crate::Result;

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Exchange to publish to
    pub exchange: String,

    /// Max publish attempts per event
    pub max_retry_attempts: u32,

    /// Initial retry delay
    pub initial_retry_delay: Duration,

    /// Retry delay ceiling
    pub max_retry_delay: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange: "corebank.transfers".to_string(),
            max_retry_attempts: 5,
            initial_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_secs(2),
        }
    }
}

/// CDC publisher
pub struct CdcPublisher {
    transport: Arc<dyn BusTransport>,
    config: PublisherConfig,
}

impl CdcPublisher {
    /// Create a new publisher
    pub fn new(transport: Arc<dyn BusTransport>, config: PublisherConfig) -> Self {
        Self { transport, config }
    }

    /// Publish one event
    pub async fn publish_event(&self, event: &TransferEvent) -> Result<()> {
        let start = Instant::now();
        let envelope = EventEnvelope::from_event(event);
        let routing_key = envelope.routing_key();
        let payload = Bytes::from(envelope.to_bytes()?);

        let result = self.publish_with_retry(routing_key, payload).await;

        CDC_PUBLISH_DURATION
            .with_label_values(&[routing_key])
            .observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "success" } else { "error" };
        CDC_PUBLISH_TOTAL
            .with_label_values(&[routing_key, status])
            .inc();

        result
    }

    /// Publish with exponential backoff retry
    async fn publish_with_retry(&self, routing_key: &str, payload: Bytes) -> Result<()> {
        let mut attempts = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            attempts += 1;

            match self
                .transport
                .publish(&self.config.exchange, routing_key, payload.clone())
                .await
            {
                Ok(()) => {
                    if attempts > 1 {
                        info!(routing_key, attempts, "event published after retries");
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempts >= self.config.max_retry_attempts {
                        error!(routing_key, attempts, error = %e, "giving up on publish");
                        return Err(e);
                    }

                    warn!(routing_key, attempts, delay = ?delay, error = %e, "publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.max_retry_delay);
                }
            }
        }
    }

    /// Pump the ledger event stream until it closes or shutdown is signaled
    pub async fn run(
        self,
        mut events: mpsc::Receiver<TransferEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(exchange = %self.config.exchange, "cdc publisher started");

        loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => {
                        if let Err(e) = self.publish_event(&event).await {
                            // Retries exhausted; the audit trail downstream
                            // will show the gap.
                            error!(
                                transfer_id = %event.transfer.id,
                                kind = %event.kind,
                                error = %e,
                                "event lost after publish retries"
                            );
                        }
                    }
                    None => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("cdc publisher stopped");
    }
}

/// Spawn the publisher pump task
pub fn spawn_publisher(
    transport: Arc<dyn BusTransport>,
    config: PublisherConfig,
    events: mpsc::Receiver<TransferEvent>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let publisher = CdcPublisher::new(transport, config);
    tokio::spawn(publisher.run(events, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryBroker;
    use chrono::Utc;
    use ledger_core::{
        Account, AccountId, AccountType, Currency, Money, Transfer, TransferEventKind, TransferId,
        TransferKind, TransferState,
    };

    fn test_event() -> TransferEvent {
        let account = |id: u128| Account {
            id: AccountId::new(id),
            currency: Currency::USD,
            account_type: AccountType::Deposit,
            debits_posted: 0,
            credits_posted: 1000,
            debits_pending: 0,
            credits_pending: 0,
            user_tag: None,
            created_at: Utc::now(),
        };

        TransferEvent {
            kind: TransferEventKind::SinglePhase,
            timestamp: Utc::now(),
            transfer: Transfer {
                id: TransferId::new(1),
                debit_account_id: AccountId::new(1),
                credit_account_id: AccountId::new(2),
                amount: Money::new(500, Currency::USD),
                kind: TransferKind::CustomerTransfer,
                state: TransferState::SinglePhase,
                pending_id: None,
                timeout_at: None,
                reference: None,
                created_at: Utc::now(),
            },
            debit_account: account(1),
            credit_account: account(2),
        }
    }

    #[tokio::test]
    async fn test_publish_lands_on_bound_queue() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue(
                "corebank.transfers",
                "q",
                &["single_phase".to_string()],
            )
            .await
            .unwrap();

        let publisher = CdcPublisher::new(broker.clone(), PublisherConfig::default());
        publisher.publish_event(&test_event()).await.unwrap();

        assert_eq!(broker.queue_depth("q").await, 1);
        let delivery = broker.next_delivery("q").await.unwrap();
        let envelope = EventEnvelope::from_bytes(&delivery.payload).unwrap();
        assert_eq!(envelope.event_type, TransferEventKind::SinglePhase);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_retries_through_outage() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("corebank.transfers", "q", &["#".to_string()])
            .await
            .unwrap();
        broker.set_failed(true);

        let publisher = CdcPublisher::new(
            broker.clone(),
            PublisherConfig {
                max_retry_attempts: 5,
                ..Default::default()
            },
        );

        let restore = {
            let broker = broker.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                broker.set_failed(false);
            })
        };

        publisher.publish_event(&test_event()).await.unwrap();
        restore.await.unwrap();

        assert_eq!(broker.queue_depth("q").await, 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_is_an_error() {
        let broker = MemoryBroker::new();
        broker.set_failed(true);

        let publisher = CdcPublisher::new(
            broker,
            PublisherConfig {
                max_retry_attempts: 2,
                initial_retry_delay: Duration::from_millis(1),
                ..Default::default()
            },
        );

        assert!(publisher.publish_event(&test_event()).await.is_err());
    }
}
