//! Bus transport abstraction
//!
//! The production deployment speaks to an AMQP topic exchange; that driver
//! lives outside this workspace. [`BusTransport`] is the seam it fills, and
//! [`MemoryBroker`] is the in-process implementation used by tests and the
//! demo container. Queues are durable for the life of the broker: a message
//! leaves its queue only on ack, and a nack-with-requeue puts it back at the
//! front marked redelivered.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::{Error, Result};

/// One delivered message awaiting acknowledgment
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Delivery tag, unique per broker
    pub tag: u64,

    /// Routing key the message was published under
    pub routing_key: String,

    /// Message payload
    pub payload: Bytes,

    /// True when this delivery is a redelivery after a nack
    pub redelivered: bool,
}

/// Topic-exchange transport contract
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Declare a durable queue and bind it to routing keys on an exchange
    async fn bind_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<()>;

    /// Publish one message to an exchange
    async fn publish(&self, exchange: &str, routing_key: &str, payload: Bytes) -> Result<()>;

    /// Wait for the next delivery on a queue
    async fn next_delivery(&self, queue: &str) -> Result<Delivery>;

    /// Acknowledge a delivery; the message is gone
    async fn ack(&self, queue: &str, tag: u64) -> Result<()>;

    /// Reject a delivery; `requeue` puts it back for redelivery
    async fn nack(&self, queue: &str, tag: u64, requeue: bool) -> Result<()>;
}

#[derive(Debug)]
struct QueuedMessage {
    tag: u64,
    routing_key: String,
    payload: Bytes,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueuedMessage>,
    unacked: HashMap<u64, QueuedMessage>,
    bindings: HashMap<String, Vec<String>>, // exchange -> routing keys
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
}

/// In-process topic exchange with durable queues
pub struct MemoryBroker {
    state: Mutex<BrokerState>,
    // Version counter; any state change bumps it so blocked consumers
    // re-check without missed wakeups.
    wake: watch::Sender<u64>,
    next_tag: AtomicU64,
    failed: AtomicBool,
}

impl MemoryBroker {
    /// Create an empty broker
    pub fn new() -> Arc<Self> {
        let (wake, _) = watch::channel(0);
        Arc::new(Self {
            state: Mutex::new(BrokerState::default()),
            wake,
            next_tag: AtomicU64::new(1),
            failed: AtomicBool::new(false),
        })
    }

    /// Fault injection: a failed broker rejects every call until restored
    pub fn set_failed(&self, failed: bool) {
        self.failed.store(failed, Ordering::SeqCst);
        self.wake.send_modify(|v| *v += 1);
    }

    fn check_connection(&self) -> Result<()> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(Error::Transport("broker connection lost".to_string()));
        }
        Ok(())
    }

    /// Number of messages ready on a queue (test observability)
    pub async fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }
}

#[async_trait]
impl BusTransport for MemoryBroker {
    async fn bind_queue(
        &self,
        exchange: &str,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<()> {
        self.check_connection()?;
        let mut state = self.state.lock().await;
        let queue_state = state.queues.entry(queue.to_string()).or_default();
        queue_state
            .bindings
            .insert(exchange.to_string(), routing_keys.to_vec());
        tracing::debug!(exchange, queue, ?routing_keys, "queue bound");
        Ok(())
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: Bytes) -> Result<()> {
        self.check_connection()?;
        let mut state = self.state.lock().await;

        for queue_state in state.queues.values_mut() {
            let bound = queue_state
                .bindings
                .get(exchange)
                .map_or(false, |keys| keys.iter().any(|k| k == routing_key || k == "#"));
            if bound {
                let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
                queue_state.ready.push_back(QueuedMessage {
                    tag,
                    routing_key: routing_key.to_string(),
                    payload: payload.clone(),
                    redelivered: false,
                });
            }
        }
        drop(state);

        self.wake.send_modify(|v| *v += 1);
        Ok(())
    }

    async fn next_delivery(&self, queue: &str) -> Result<Delivery> {
        let mut wake_rx = self.wake.subscribe();

        loop {
            self.check_connection()?;

            {
                let mut state = self.state.lock().await;
                let queue_state = state
                    .queues
                    .get_mut(queue)
                    .ok_or_else(|| Error::QueueNotFound(queue.to_string()))?;

                if let Some(message) = queue_state.ready.pop_front() {
                    let delivery = Delivery {
                        tag: message.tag,
                        routing_key: message.routing_key.clone(),
                        payload: message.payload.clone(),
                        redelivered: message.redelivered,
                    };
                    queue_state.unacked.insert(message.tag, message);
                    return Ok(delivery);
                }
            }

            // A publish between the check above and this await bumps the
            // version, so changed() returns immediately.
            if wake_rx.changed().await.is_err() {
                return Err(Error::ChannelClosed("broker wake channel".to_string()));
            }
        }
    }

    async fn ack(&self, queue: &str, tag: u64) -> Result<()> {
        let mut state = self.state.lock().await;
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| Error::QueueNotFound(queue.to_string()))?;
        queue_state.unacked.remove(&tag);
        Ok(())
    }

    async fn nack(&self, queue: &str, tag: u64, requeue: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| Error::QueueNotFound(queue.to_string()))?;

        if let Some(mut message) = queue_state.unacked.remove(&tag) {
            if requeue {
                message.redelivered = true;
                queue_state.ready.push_front(message);
                drop(state);
                self.wake.send_modify(|v| *v += 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_publish_routes_to_bound_queue() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "audit", &keys(&["single_phase"]))
            .await
            .unwrap();

        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"a"))
            .await
            .unwrap();
        broker
            .publish("transfers", "two_phase_pending", Bytes::from_static(b"b"))
            .await
            .unwrap();

        assert_eq!(broker.queue_depth("audit").await, 1);

        let delivery = broker.next_delivery("audit").await.unwrap();
        assert_eq!(delivery.routing_key, "single_phase");
        assert!(!delivery.redelivered);
    }

    #[tokio::test]
    async fn test_wildcard_binding_catches_everything() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "all", &keys(&["#"]))
            .await
            .unwrap();

        for key in ["single_phase", "two_phase_posted", "two_phase_voided"] {
            broker
                .publish("transfers", key, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        assert_eq!(broker.queue_depth("all").await, 3);
    }

    #[tokio::test]
    async fn test_delivery_wakes_blocked_consumer() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "q", &keys(&["#"]))
            .await
            .unwrap();

        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.next_delivery("q").await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"late"))
            .await
            .unwrap();

        let delivery = waiter.await.unwrap().unwrap();
        assert_eq!(&delivery.payload[..], b"late");
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers_in_order() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "q", &keys(&["#"]))
            .await
            .unwrap();

        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"first"))
            .await
            .unwrap();
        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"second"))
            .await
            .unwrap();

        let delivery = broker.next_delivery("q").await.unwrap();
        assert_eq!(&delivery.payload[..], b"first");
        broker.nack("q", delivery.tag, true).await.unwrap();

        // Redelivered ahead of the second message, flagged as such.
        let delivery = broker.next_delivery("q").await.unwrap();
        assert_eq!(&delivery.payload[..], b"first");
        assert!(delivery.redelivered);
        broker.ack("q", delivery.tag).await.unwrap();

        let delivery = broker.next_delivery("q").await.unwrap();
        assert_eq!(&delivery.payload[..], b"second");
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "q", &keys(&["#"]))
            .await
            .unwrap();
        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"poison"))
            .await
            .unwrap();

        let delivery = broker.next_delivery("q").await.unwrap();
        broker.nack("q", delivery.tag, false).await.unwrap();
        assert_eq!(broker.queue_depth("q").await, 0);
    }

    #[tokio::test]
    async fn test_failed_broker_rejects_calls() {
        let broker = MemoryBroker::new();
        broker
            .bind_queue("transfers", "q", &keys(&["#"]))
            .await
            .unwrap();

        broker.set_failed(true);
        assert!(matches!(
            broker
                .publish("transfers", "single_phase", Bytes::from_static(b"x"))
                .await,
            Err(Error::Transport(_))
        ));
        assert!(matches!(
            broker.next_delivery("q").await,
            Err(Error::Transport(_))
        ));

        broker.set_failed(false);
        broker
            .publish("transfers", "single_phase", Bytes::from_static(b"x"))
            .await
            .unwrap();
    }
}
