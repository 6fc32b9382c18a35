//! Benchmark utilities.

#![warn(missing_docs)]

use boundtx_core::{ManagedSource, TxKit, TxResult};
use boundtx_store::{MemoryStore, Row, Statement, Value};
use std::sync::Arc;

/// Table the benchmarks write to.
pub const TABLE: &str = "bench";

/// Creates a store with the benchmark table and a kit over it.
pub fn bench_kit() -> (MemoryStore, TxKit) {
    let store = MemoryStore::new();
    store.create_table(TABLE);
    let kit = TxKit::new(Arc::new(store.clone()));
    (store, kit)
}

/// Generates a row with a key and a payload of `payload_size` bytes.
pub fn row(key: i64, payload_size: usize) -> Row {
    Row(vec![Value::Integer(key), Value::Bytes(vec![0xAB; payload_size])])
}

/// Inserts `count` rows through the caller's transaction.
pub fn insert_rows(source: &ManagedSource, count: usize, payload_size: usize) -> TxResult<()> {
    let conn = source.connection()?;
    for key in 0..count {
        conn.execute(&Statement::insert(TABLE, row(key as i64, payload_size)))?;
    }
    Ok(())
}
