//! # boundtx Core
//!
//! Thread-bound transaction demarcation over a connection factory.
//!
//! This crate provides:
//! - [`TransactionManager`]: begin, commit and rollback per thread, with
//!   lazy connection binding
//! - [`ManagedSource`]: the connection source query code reads from
//! - [`BoundConnection`]: the handle to the transaction's raw connection
//! - Unit-of-work entry points that commit on success and roll back on
//!   failure or panic
//!
//! ## Transaction states
//!
//! Each thread holds one state per manager:
//!
//! ```text
//! Absent --begin--> Pending --first connection--> Active
//!   ^                  |                             |
//!   +--commit/rollback-+-------commit/rollback-------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use boundtx_core::{TxError, TxKit};
//! use boundtx_store::{MemoryStore, Row, Statement};
//! use std::sync::Arc;
//!
//! let store = MemoryStore::new();
//! store.create_table("persons");
//! let kit = TxKit::new(Arc::new(store.clone()));
//! let source = kit.source();
//!
//! let err = kit
//!     .manager()
//!     .tx(|| {
//!         source
//!             .connection()?
//!             .execute(&Statement::insert("persons", Row::new([1])))?;
//!         Err("Something bad happened".into())
//!     })
//!     .unwrap_err();
//!
//! assert!(matches!(err, TxError::TransactionFailure { .. }));
//! assert_eq!(store.committed_count("persons"), 0);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod context;
mod error;
mod kit;
mod manager;
mod source;
mod stats;
mod types;

pub use config::Config;
pub use connection::BoundConnection;
pub use error::{
    BoxError, TxError, TxResult, CONNECTION_MANAGED, CREDENTIALS_UNSUPPORTED, TX_ALREADY_ACTIVE,
    TX_NOT_ACTIVE,
};
pub use kit::{TxKit, TxKitBuilder};
pub use manager::{ConnectionProvider, ConnectionTuner, TransactionManager};
pub use source::ManagedSource;
pub use stats::{TxStats, TxStatsSnapshot};
pub use types::{ManagerId, TxStatus};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
