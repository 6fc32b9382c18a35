//! Property-based test generators using proptest.
//!
//! Generates random sequences of protocol operations and provides a
//! reference model of the per-thread state machine to check them against.

use crate::fixtures::{insert_person, persons_count, TestEnv};
use boundtx_core::{TxError, TxResult, TxStatus, TX_ALREADY_ACTIVE, TX_NOT_ACTIVE};
use proptest::prelude::*;

/// One step a caller can take against a manager and its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOp {
    /// `begin`.
    Begin,
    /// A bare connection request.
    Connect,
    /// Insert one person with the given id.
    Insert(i64),
    /// Count persons.
    Count,
    /// `commit`.
    Commit,
    /// `rollback`.
    Rollback,
}

/// What an operation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded without a value.
    Done,
    /// A count query returned this many rows.
    Count(u64),
    /// Failed with this protocol violation.
    Protocol(&'static str),
    /// Failed with a transaction failure.
    Failure(String),
}

impl Outcome {
    fn from_result<T>(result: TxResult<T>, done: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => done(value),
            Err(TxError::ProtocolViolation { message }) => Self::Protocol(message),
            Err(err @ TxError::TransactionFailure { .. }) => Self::Failure(err.to_string()),
        }
    }
}

/// Strategy for a single operation, weighted towards well-formed use.
pub fn tx_op_strategy() -> impl Strategy<Value = TxOp> {
    prop_oneof![
        3 => Just(TxOp::Begin),
        1 => Just(TxOp::Connect),
        3 => (0i64..100).prop_map(TxOp::Insert),
        2 => Just(TxOp::Count),
        2 => Just(TxOp::Commit),
        2 => Just(TxOp::Rollback),
    ]
}

/// Strategy for operation sequences of up to `max_len` steps.
pub fn tx_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<TxOp>> {
    prop::collection::vec(tx_op_strategy(), 0..=max_len)
}

/// Reference model of one thread's transaction state over a persons table.
#[derive(Debug, Clone)]
pub struct ProtocolModel {
    status: TxStatus,
    pending_rows: u64,
    committed_rows: u64,
    connections_bound: u64,
}

impl Default for ProtocolModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolModel {
    /// Creates a model with no transaction and no rows.
    pub fn new() -> Self {
        Self {
            status: TxStatus::Absent,
            pending_rows: 0,
            committed_rows: 0,
            connections_bound: 0,
        }
    }

    /// Returns the modelled status.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Returns the modelled committed row count.
    pub fn committed_rows(&self) -> u64 {
        self.committed_rows
    }

    /// Returns the modelled number of connections bound so far.
    pub fn connections_bound(&self) -> u64 {
        self.connections_bound
    }

    /// Applies `op` and returns the outcome the real manager must produce.
    pub fn apply(&mut self, op: TxOp) -> Outcome {
        match op {
            TxOp::Begin => {
                if self.status != TxStatus::Absent {
                    return Outcome::Protocol(TX_ALREADY_ACTIVE);
                }
                self.status = TxStatus::Pending;
                Outcome::Done
            }
            TxOp::Connect => self.access().map_or_else(Outcome::Protocol, |()| Outcome::Done),
            TxOp::Insert(_) => match self.access() {
                Ok(()) => {
                    self.pending_rows += 1;
                    Outcome::Count(1)
                }
                Err(message) => Outcome::Protocol(message),
            },
            TxOp::Count => match self.access() {
                Ok(()) => Outcome::Count(self.committed_rows + self.pending_rows),
                Err(message) => Outcome::Protocol(message),
            },
            TxOp::Commit | TxOp::Rollback => {
                if self.status == TxStatus::Absent {
                    return Outcome::Protocol(TX_NOT_ACTIVE);
                }
                if op == TxOp::Commit {
                    self.committed_rows += self.pending_rows;
                }
                self.pending_rows = 0;
                self.status = TxStatus::Absent;
                Outcome::Done
            }
        }
    }

    fn access(&mut self) -> Result<(), &'static str> {
        match self.status {
            TxStatus::Absent => Err(TX_NOT_ACTIVE),
            TxStatus::Pending => {
                self.status = TxStatus::Active;
                self.connections_bound += 1;
                Ok(())
            }
            TxStatus::Active => Ok(()),
        }
    }
}

/// Runs `op` against the environment's manager and source.
pub fn execute_op(env: &TestEnv, op: TxOp) -> Outcome {
    let manager = env.manager();
    let source = env.source();
    match op {
        TxOp::Begin => Outcome::from_result(manager.begin(), |()| Outcome::Done),
        TxOp::Connect => Outcome::from_result(source.connection(), |_| Outcome::Done),
        TxOp::Insert(id) => {
            Outcome::from_result(insert_person(source, id, "generated"), Outcome::Count)
        }
        TxOp::Count => Outcome::from_result(persons_count(source), Outcome::Count),
        TxOp::Commit => Outcome::from_result(manager.commit(), |()| Outcome::Done),
        TxOp::Rollback => Outcome::from_result(manager.rollback(), |()| Outcome::Done),
    }
}
