//! # boundtx Testkit
//!
//! Test utilities for boundtx.
//!
//! This crate provides:
//! - A memory store wired to a manager and managed source
//! - Persons-table helpers that go through the caller's transaction
//! - Property-based generators and a reference model of the state machine
//! - A concurrent torture harness
//!
//! ## Usage
//!
//! ```rust
//! use boundtx_testkit::prelude::*;
//!
//! let env = TestEnv::new();
//! env.manager().begin().unwrap();
//! insert_person(env.source(), 1, "Mr Foo").unwrap();
//! env.manager().commit().unwrap();
//! assert_eq!(env.committed_persons(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
