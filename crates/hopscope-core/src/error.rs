//! Error types for the measurement harness

use thiserror::Error;

/// Errors that abort an experiment run
#[derive(Error, Debug)]
pub enum ExperimentError {
    /// Invalid configuration or node count
    #[error("Configuration error: {0}")]
    Config(String),

    /// The store-target node answered, but not with an acknowledged write
    #[error("Store rejected by node {port} (HTTP {status}): {body}")]
    StoreRejected { port: u16, status: u16, body: String },

    /// The store request never produced a usable answer
    #[error("Store on node {port} failed: {reason}")]
    StoreFailed { port: u16, reason: String },

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Transport-level failure of a single request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be opened (refused, DNS, connect timeout)
    #[error("Node unreachable: {0}")]
    Unreachable(String),

    /// Request was sent but no complete answer arrived in time
    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Any other HTTP or protocol failure
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for ExperimentError {
    fn from(err: reqwest::Error) -> Self {
        ExperimentError::Client(err.to_string())
    }
}

/// Result type for experiment operations
pub type Result<T> = std::result::Result<T, ExperimentError>;
