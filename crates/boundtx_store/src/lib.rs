//! # boundtx Store
//!
//! Connection contracts consumed by the transaction manager, and an
//! in-memory reference store.
//!
//! This crate provides the lowest-level abstraction for boundtx. A
//! [`ConnectionFactory`] hands out [`RawConnection`]s; nothing here knows
//! about transaction demarcation or which thread owns a connection.
//!
//! ## Design Principles
//!
//! - Factories must be `Send + Sync` and safe for concurrent acquisition
//! - Connections start in autocommit mode and own their buffered writes
//! - Closing a connection always releases it, even when the driver reports
//!   a failure
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For tests, benches and demos, with fault injection
//!
//! ## Example
//!
//! ```rust
//! use boundtx_store::{ConnectionFactory, MemoryStore, RawConnection, Row, Statement};
//!
//! let store = MemoryStore::new();
//! store.create_table("persons");
//! let mut conn = store.connect().unwrap();
//! conn.execute(&Statement::insert("persons", Row::new([1]))).unwrap();
//! conn.close().unwrap();
//! assert_eq!(store.committed_count("persons"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod factory;
mod fault;
mod memory;
mod stats;

pub use connection::{QueryResult, RawConnection, Row, Statement, Value};
pub use error::{StoreError, StoreResult};
pub use factory::{ConnectionFactory, Credentials};
pub use fault::{FaultPlan, FaultPoint};
pub use memory::{MemoryConnection, MemoryStore};
pub use stats::{StoreStats, StoreStatsSnapshot};
