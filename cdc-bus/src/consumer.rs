//! CDC consumer with explicit reconnection state machine
//!
//! The consumer binds one durable queue to the configured routing keys and
//! dispatches every delivery to the handlers registered for its event type
//! plus every wildcard handler.
//!
//! - parse failure: nack without requeue, poison entry recorded
//! - handler failure: nack with requeue (at-least-once retry)
//! - all handlers succeed: ack
//!
//! Transport failures drive the state machine
//! `Disconnected -> Connecting -> Connected -> Draining` with exponential
//! backoff (5 s doubling to a 30 s ceiling). Shutdown drains the in-flight
//! dispatch before the task returns.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

use ledger_core::TransferEventKind;

use crate::config::CdcConfig;
use crate::handlers::EventHandler;
use crate::message::EventEnvelope;
use crate::metrics::{CDC_PROCESS_DURATION, CDC_RECEIVE_TOTAL};
use crate::transport::{BusTransport, Delivery};
use crate::{Error, Result};

/// Reconnection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// No broker connection
    Disconnected,
    /// Binding queue and consumption state
    Connecting,
    /// Consuming deliveries
    Connected,
    /// Shutdown requested; finishing in-flight work
    Draining,
}

/// A delivery that could not be parsed, set aside for inspection
#[derive(Debug, Clone)]
pub struct PoisonMessage {
    /// Routing key of the bad delivery
    pub routing_key: String,

    /// Parse failure description
    pub error: String,

    /// When the delivery was set aside
    pub received_at: DateTime<Utc>,
}

/// CDC consumer
pub struct CdcConsumer {
    transport: Arc<dyn BusTransport>,
    config: CdcConfig,
    typed: HashMap<TransferEventKind, Vec<Arc<dyn EventHandler>>>,
    wildcard: Vec<Arc<dyn EventHandler>>,
    poison: Mutex<Vec<PoisonMessage>>,
    state: RwLock<ConsumerState>,
}

impl CdcConsumer {
    /// Create a consumer with no handlers registered
    pub fn new(transport: Arc<dyn BusTransport>, config: CdcConfig) -> Self {
        Self {
            transport,
            config,
            typed: HashMap::new(),
            wildcard: Vec::new(),
            poison: Mutex::new(Vec::new()),
            state: RwLock::new(ConsumerState::Disconnected),
        }
    }

    /// Register a handler for one event type
    pub fn register(mut self, kind: TransferEventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.typed.entry(kind).or_default().push(handler);
        self
    }

    /// Register a handler receiving every event type
    pub fn register_wildcard(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.wildcard.push(handler);
        self
    }

    /// Current state of the reconnection machine
    pub fn state(&self) -> ConsumerState {
        *self.state.read()
    }

    /// Deliveries set aside as unparseable
    pub fn poison_messages(&self) -> Vec<PoisonMessage> {
        self.poison.lock().clone()
    }

    fn set_state(&self, state: ConsumerState) {
        *self.state.write() = state;
    }

    /// Run until shutdown; reconnects on transport failure
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = self.config.reconnect_initial();

        'reconnect: loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConsumerState::Connecting);
            if let Err(e) = self
                .transport
                .bind_queue(&self.config.exchange, &self.config.queue, &self.config.routing_keys)
                .await
            {
                warn!(error = %e, backoff = ?backoff, "queue bind failed, backing off");
                self.set_state(ConsumerState::Disconnected);
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {}
                }
                backoff = (backoff * 2).min(self.config.reconnect_max());
                continue;
            }

            info!(
                queue = %self.config.queue,
                routing_keys = ?self.config.routing_keys,
                "cdc consumer connected"
            );
            self.set_state(ConsumerState::Connected);
            backoff = self.config.reconnect_initial();

            loop {
                tokio::select! {
                    delivery = self.transport.next_delivery(&self.config.queue) => {
                        match delivery {
                            Ok(delivery) => self.dispatch(delivery).await,
                            Err(e) => {
                                warn!(error = %e, "consumption failed, reconnecting");
                                self.set_state(ConsumerState::Disconnected);
                                tokio::select! {
                                    _ = tokio::time::sleep(backoff) => {}
                                    _ = shutdown.changed() => {}
                                }
                                backoff = (backoff * 2).min(self.config.reconnect_max());
                                continue 'reconnect;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            // In-flight dispatches have already completed:
                            // dispatch() is awaited before the next select.
                            self.set_state(ConsumerState::Draining);
                            break 'reconnect;
                        }
                    }
                }
            }
        }

        self.set_state(ConsumerState::Disconnected);
        info!("cdc consumer stopped");
    }

    /// Process one delivery: parse, dispatch, ack or nack
    async fn dispatch(&self, delivery: Delivery) {
        let queue = &self.config.queue;

        if self.config.auto_ack {
            if let Err(e) = self.transport.ack(queue, delivery.tag).await {
                warn!(error = %e, "auto-ack failed");
            }
        }

        let envelope = match EventEnvelope::from_bytes(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "unparseable delivery set aside"
                );
                CDC_RECEIVE_TOTAL.with_label_values(&["parse_error"]).inc();
                self.poison.lock().push(PoisonMessage {
                    routing_key: delivery.routing_key.clone(),
                    error: e.to_string(),
                    received_at: Utc::now(),
                });
                if !self.config.auto_ack {
                    if let Err(e) = self.transport.nack(queue, delivery.tag, false).await {
                        warn!(error = %e, "poison nack failed");
                    }
                }
                return;
            }
        };

        CDC_RECEIVE_TOTAL.with_label_values(&["success"]).inc();
        let start = Instant::now();

        let result = self.run_handlers(&envelope).await;

        CDC_PROCESS_DURATION
            .with_label_values(&[envelope.routing_key()])
            .observe(start.elapsed().as_secs_f64());

        if self.config.auto_ack {
            if let Err(e) = result {
                error!(
                    transfer_id = %envelope.transfer.id,
                    error = %e,
                    "handler failed under auto-ack; delivery not retried"
                );
            }
            return;
        }

        match result {
            Ok(()) => {
                if let Err(e) = self.transport.ack(queue, delivery.tag).await {
                    warn!(error = %e, "ack failed");
                }
            }
            Err(e) => {
                warn!(
                    transfer_id = %envelope.transfer.id,
                    redelivered = delivery.redelivered,
                    error = %e,
                    "handler failed, requeueing delivery"
                );
                if let Err(e) = self.transport.nack(queue, delivery.tag, true).await {
                    warn!(error = %e, "requeue nack failed");
                }
            }
        }
    }

    /// Invoke the typed handlers for the event plus every wildcard handler
    async fn run_handlers(&self, envelope: &EventEnvelope) -> Result<()> {
        let handlers: Vec<&Arc<dyn EventHandler>> = self
            .typed
            .get(&envelope.event_type)
            .into_iter()
            .flatten()
            .chain(self.wildcard.iter())
            .collect();

        let results = join_all(handlers.iter().map(|h| h.handle(envelope))).await;

        for (handler, result) in handlers.iter().zip(results) {
            if let Err(e) = result {
                return Err(Error::HandlerFailed {
                    handler: handler.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Spawn the consumer task
pub fn spawn_consumer(
    consumer: Arc<CdcConsumer>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(consumer.run(shutdown))
}
