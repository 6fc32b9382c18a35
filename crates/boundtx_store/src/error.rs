//! Error types for store operations.

use crate::fault::FaultPoint;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by connection factories and raw connections.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,

    /// The factory refused to open a connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The statement referenced a table that does not exist.
    #[error("no such table: {0}")]
    NoSuchTable(String),

    /// The operation is not valid in the connection's current mode.
    #[error("invalid connection state: {0}")]
    InvalidState(String),

    /// A failure injected through a [`crate::FaultPlan`].
    #[error("injected fault at {point}")]
    Injected {
        /// Where the fault fired.
        point: FaultPoint,
    },
}

impl StoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a refused-connection error.
    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused(message.into())
    }
}
