//! Error types for the connector
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ConnectorError
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Unified error type for connector operations
#[derive(Debug, Error)]
pub enum ConnectorError {
    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Configuration(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    /// I/O failure or truncated stream on a worker. Always leaves the
    /// worker disconnected.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    #[error("Pool timeout: {0}")]
    PoolTimeout(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool unavailable: {0}")]
    PoolUnavailable(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error {code:#x}: {message}")]
    Server { code: u32, message: String },
}

impl ConnectorError {
    /// True for failures that left the worker's socket unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, ConnectorError::Transport(_))
    }

    pub(crate) fn truncated(what: &str, needed: usize, available: usize) -> Self {
        ConnectorError::Protocol(format!(
            "Truncated {}: expected {} bytes, got {}",
            what, needed, available
        ))
    }
}
