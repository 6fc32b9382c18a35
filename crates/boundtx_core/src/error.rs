//! Error types for transaction demarcation.

use boundtx_store::StoreError;
use std::error::Error as StdError;
use thiserror::Error;

/// Any error a unit of work may raise through the wrapped entry points.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for transaction operations.
pub type TxResult<T> = Result<T, TxError>;

/// Message of the protocol violation raised by a second `begin`.
pub const TX_ALREADY_ACTIVE: &str = "Transaction is in progress already.";

/// Message of the protocol violation raised without a transaction.
pub const TX_NOT_ACTIVE: &str = "Transaction is not active.";

/// Message raised when unit-of-work code tries to end the transaction itself.
pub const CONNECTION_MANAGED: &str = "Connection is managed by the transaction manager.";

/// Message raised for credentialed connection requests.
pub const CREDENTIALS_UNSUPPORTED: &str =
    "Connections with explicit credentials are not supported.";

/// Errors raised by the transaction manager and its managed connections.
#[derive(Debug, Error)]
pub enum TxError {
    /// The caller broke the begin/commit/rollback/access contract.
    ///
    /// This is a programming error. It is never retried and never wrapped.
    #[error("{message}")]
    ProtocolViolation {
        /// Fixed description of the violation.
        message: &'static str,
    },

    /// The store failed during acquire, commit or rollback, or a unit of
    /// work run through a wrapped entry point failed.
    #[error("transaction failed: {source}")]
    TransactionFailure {
        /// The original failure.
        #[source]
        source: BoxError,
    },
}

impl TxError {
    /// Creates a protocol violation.
    pub const fn protocol(message: &'static str) -> Self {
        Self::ProtocolViolation { message }
    }

    /// Protocol violation for a `begin` inside a transaction.
    pub const fn already_active() -> Self {
        Self::protocol(TX_ALREADY_ACTIVE)
    }

    /// Protocol violation for an operation outside a transaction.
    pub const fn not_active() -> Self {
        Self::protocol(TX_NOT_ACTIVE)
    }

    /// Wraps any failure as a transaction failure.
    pub fn failure(source: impl Into<BoxError>) -> Self {
        Self::TransactionFailure {
            source: source.into(),
        }
    }

    /// Re-raises a unit-of-work failure: manager errors pass through
    /// unchanged, everything else is wrapped.
    pub fn from_unit(err: BoxError) -> Self {
        match err.downcast::<TxError>() {
            Ok(tx) => *tx,
            Err(other) => Self::TransactionFailure { source: other },
        }
    }

    /// Returns true for protocol violations.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }

    /// Returns the protocol violation message, if this is one.
    #[must_use]
    pub fn protocol_message(&self) -> Option<&'static str> {
        match self {
            Self::ProtocolViolation { message } => Some(*message),
            Self::TransactionFailure { .. } => None,
        }
    }

    /// Returns the wrapped failure, if this is a transaction failure.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::TransactionFailure { source } => Some(source.as_ref()),
            Self::ProtocolViolation { .. } => None,
        }
    }

    /// Downcasts the wrapped failure to a concrete type.
    #[must_use]
    pub fn cause_as<E: StdError + 'static>(&self) -> Option<&E> {
        self.cause().and_then(|cause| cause.downcast_ref::<E>())
    }
}

impl From<StoreError> for TxError {
    fn from(err: StoreError) -> Self {
        Self::failure(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn protocol_violation_displays_message() {
        assert_eq!(TxError::already_active().to_string(), TX_ALREADY_ACTIVE);
        assert_eq!(TxError::not_active().to_string(), TX_NOT_ACTIVE);
        assert!(TxError::not_active().is_protocol_violation());
        assert!(TxError::not_active().source().is_none());
    }

    #[test]
    fn store_errors_become_failures() {
        let err = TxError::from(StoreError::Closed);
        assert!(!err.is_protocol_violation());
        assert!(err.cause_as::<StoreError>().is_some());
        assert_eq!(err.to_string(), "transaction failed: connection is closed");
    }

    #[test]
    fn failure_keeps_cause_message() {
        let err = TxError::failure(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
        assert_eq!(err.cause_as::<io::Error>().unwrap().kind(), io::ErrorKind::Other);
    }

    #[test]
    fn from_unit_passes_manager_errors_through() {
        let boxed: BoxError = Box::new(TxError::not_active());
        let err = TxError::from_unit(boxed);
        assert_eq!(err.protocol_message(), Some(TX_NOT_ACTIVE));
    }

    #[test]
    fn from_unit_wraps_foreign_errors() {
        let boxed: BoxError = "Something bad happened".into();
        let err = TxError::from_unit(boxed);
        assert!(matches!(err, TxError::TransactionFailure { .. }));
        assert_eq!(err.cause().unwrap().to_string(), "Something bad happened");
    }
}
