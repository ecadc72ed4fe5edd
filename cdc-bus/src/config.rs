//! Configuration for the CDC pipeline

use ledger_core::TransferEventKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CDC consumer/publisher wiring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdcConfig {
    /// Topic exchange events are published to
    pub exchange: String,

    /// Durable queue the consumer reads from
    pub queue: String,

    /// Routing keys bound to the queue
    pub routing_keys: Vec<String>,

    /// Broker-side auto-acknowledge (disables nack-with-requeue retries)
    pub auto_ack: bool,

    /// Initial reconnect backoff (seconds)
    pub reconnect_initial_secs: u64,

    /// Reconnect backoff ceiling (seconds)
    pub reconnect_max_secs: u64,
}

impl Default for CdcConfig {
    fn default() -> Self {
        Self {
            exchange: "corebank.transfers".to_string(),
            queue: "corebank.cdc".to_string(),
            routing_keys: TransferEventKind::ALL
                .iter()
                .map(|k| k.as_str().to_string())
                .collect(),
            auto_ack: false,
            reconnect_initial_secs: 5,
            reconnect_max_secs: 30,
        }
    }
}

impl CdcConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(exchange) = std::env::var("CDC_EXCHANGE") {
            config.exchange = exchange;
        }
        if let Ok(queue) = std::env::var("CDC_QUEUE") {
            config.queue = queue;
        }
        if let Ok(keys) = std::env::var("CDC_ROUTING_KEYS") {
            config.routing_keys = keys.split(',').map(|k| k.trim().to_string()).collect();
        }
        if let Ok(auto_ack) = std::env::var("CDC_AUTO_ACK") {
            config.auto_ack = auto_ack == "1" || auto_ack.eq_ignore_ascii_case("true");
        }

        config
    }

    /// Initial reconnect backoff
    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_secs)
    }

    /// Reconnect backoff ceiling
    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_every_event_kind() {
        let config = CdcConfig::default();
        assert_eq!(config.routing_keys.len(), 5);
        assert!(config.routing_keys.contains(&"two_phase_expired".to_string()));
        assert!(!config.auto_ack);
    }

    #[test]
    fn test_backoff_defaults() {
        let config = CdcConfig::default();
        assert_eq!(config.reconnect_initial(), Duration::from_secs(5));
        assert_eq!(config.reconnect_max(), Duration::from_secs(30));
    }
}
