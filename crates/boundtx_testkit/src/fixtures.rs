//! Test fixtures and store helpers.
//!
//! Provides a ready-wired store, manager and managed source, plus the
//! persons-table helpers most scenarios are written against.

use boundtx_core::{Config, ManagedSource, TransactionManager, TxKit, TxResult};
use boundtx_store::{MemoryStore, Row, Statement, Value};
use std::sync::Arc;

/// Table used by the fixture helpers.
pub const PERSONS: &str = "persons";

/// A memory store with a persons table and a kit wired over it.
#[derive(Debug, Clone)]
pub struct TestEnv {
    /// The store, for inspecting committed data and counters.
    pub store: MemoryStore,
    /// Manager and managed source over `store`.
    pub kit: TxKit,
}

impl TestEnv {
    /// Creates an environment with the default manager configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an environment with an explicit manager configuration.
    pub fn with_config(config: Config) -> Self {
        let store = MemoryStore::new();
        store.create_table(PERSONS);
        let kit = TxKit::builder(Arc::new(store.clone()))
            .config(config)
            .build();
        Self { store, kit }
    }

    /// Returns the manager.
    pub fn manager(&self) -> &TransactionManager {
        self.kit.manager()
    }

    /// Returns the managed source.
    pub fn source(&self) -> &ManagedSource {
        self.kit.source()
    }

    /// Returns the number of committed persons, bypassing the manager.
    pub fn committed_persons(&self) -> usize {
        self.store.committed_count(PERSONS)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts person `(id, name)` through the caller's transaction.
///
/// Returns the number of affected rows.
pub fn insert_person(source: &ManagedSource, id: i64, name: &str) -> TxResult<u64> {
    let conn = source.connection()?;
    let affected = conn
        .execute(&Statement::insert(PERSONS, Row(vec![Value::from(id), Value::from(name)])))?
        .affected();
    conn.close();
    Ok(affected)
}

/// Counts the persons visible to the caller's transaction.
pub fn persons_count(source: &ManagedSource) -> TxResult<u64> {
    Ok(source.connection()?.count(PERSONS)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_starts_empty() {
        let env = TestEnv::new();
        assert_eq!(env.committed_persons(), 0);
        assert!(!env.manager().is_active());
    }

    #[test]
    fn helpers_use_the_transaction() {
        let env = TestEnv::new();
        env.manager().begin().unwrap();
        assert_eq!(insert_person(env.source(), 1, "Mr Foo").unwrap(), 1);
        assert_eq!(persons_count(env.source()).unwrap(), 1);
        assert_eq!(env.committed_persons(), 0);
        env.manager().commit().unwrap();
        assert_eq!(env.committed_persons(), 1);
    }
}
