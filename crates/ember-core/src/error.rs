//! Error types for Ember

use thiserror::Error;

/// Core error type for catalog operations
#[derive(Error, Debug)]
pub enum EmberError {
    /// The underlying connection or transaction failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A facet load was attempted on an item that has no owning database
    #[error("{0}: database not set")]
    MissingContext(String),

    /// An operation needs state that could not be loaded
    #[error("{0}")]
    PreconditionNotMet(String),

    #[error("Prepare error: {0}")]
    Prepare(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl EmberError {
    /// Whether this error came from the connection/transaction layer
    pub fn is_connection(&self) -> bool {
        matches!(self, EmberError::Connection(_))
    }
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, EmberError>;
