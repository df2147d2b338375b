//! Error types shared across the pg_warden workspace

use thiserror::Error;

/// Result type alias for pg_warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Errors that are not tied to a single layer of the gateway
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown operation type: {0}")]
    UnknownOperation(String),

    #[error("Unknown audit status: {0}")]
    UnknownStatus(String),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),
}
