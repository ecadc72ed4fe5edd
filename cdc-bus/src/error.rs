//! Error types for the CDC pipeline

use thiserror::Error;

/// Result type for CDC operations
pub type Result<T> = std::result::Result<T, Error>;

/// CDC errors
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Delivered payload could not be parsed (poison message)
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Bus transport failure (connection lost, broker down)
    #[error("transport error: {0}")]
    Transport(String),

    /// Queue referenced before declaration
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// A registered handler failed; the delivery is requeued
    #[error("handler {handler} failed: {reason}")]
    HandlerFailed {
        /// Handler name
        handler: String,
        /// Failure description
        reason: String,
    },

    /// Internal channel closed during shutdown
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}
