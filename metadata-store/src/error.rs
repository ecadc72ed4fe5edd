//! Error types for the metadata store

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport failure; the caller decides whether to retry
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Per-entity uniqueness violated
    #[error("duplicate entity: {0}")]
    Duplicate(String),

    /// Entity not present
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation rejected by referential constraints
    #[error("conflict: {0}")]
    Conflict(String),
}
