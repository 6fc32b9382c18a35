//! Transaction manager statistics.
//!
//! Counters are shared by every context using the manager and can be read
//! while transactions are in flight.

use crate::connection::Terminal;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction manager counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct TxStats {
    /// Successful `begin` calls.
    begun: AtomicU64,
    /// Transactions ended by `commit`.
    committed: AtomicU64,
    /// Transactions ended by `rollback`.
    rolled_back: AtomicU64,
    /// Transactions ended before any connection was requested.
    empty: AtomicU64,
    /// Physical connections bound to a transaction.
    connections_bound: AtomicU64,
    /// Terminal operations on which the store reported a failure.
    release_failures: AtomicU64,
}

impl TxStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_end(&self, end: Terminal, bound: bool) {
        match end {
            Terminal::Commit => self.committed.fetch_add(1, Ordering::Relaxed),
            Terminal::Rollback => self.rolled_back.fetch_add(1, Ordering::Relaxed),
        };
        if !bound {
            self.empty.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_bound(&self) {
        self.connections_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release_failure(&self) {
        self.release_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of transactions begun.
    pub fn begun(&self) -> u64 {
        self.begun.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions ended by commit, failed or not.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions ended by rollback, failed or not.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions that never bound a connection.
    pub fn empty(&self) -> u64 {
        self.empty.load(Ordering::Relaxed)
    }

    /// Returns the number of connections bound.
    pub fn connections_bound(&self) -> u64 {
        self.connections_bound.load(Ordering::Relaxed)
    }

    /// Returns the number of terminal operations the store failed.
    pub fn release_failures(&self) -> u64 {
        self.release_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions begun but not yet ended.
    pub fn in_flight(&self) -> u64 {
        self.begun()
            .saturating_sub(self.committed())
            .saturating_sub(self.rolled_back())
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> TxStatsSnapshot {
        TxStatsSnapshot {
            begun: self.begun(),
            committed: self.committed(),
            rolled_back: self.rolled_back(),
            empty: self.empty(),
            connections_bound: self.connections_bound(),
            release_failures: self.release_failures(),
        }
    }
}

/// A point-in-time copy of [`TxStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxStatsSnapshot {
    /// Transactions begun.
    pub begun: u64,
    /// Transactions ended by commit.
    pub committed: u64,
    /// Transactions ended by rollback.
    pub rolled_back: u64,
    /// Transactions that never bound a connection.
    pub empty: u64,
    /// Connections bound.
    pub connections_bound: u64,
    /// Failed terminal operations.
    pub release_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        assert_eq!(TxStats::new().snapshot(), TxStatsSnapshot::default());
    }

    #[test]
    fn record_transactions() {
        let stats = TxStats::new();

        stats.record_begin();
        stats.record_begin();
        stats.record_begin();
        stats.record_bound();
        stats.record_end(Terminal::Commit, true);
        stats.record_end(Terminal::Rollback, false);

        let snap = stats.snapshot();
        assert_eq!(snap.begun, 3);
        assert_eq!(snap.committed, 1);
        assert_eq!(snap.rolled_back, 1);
        assert_eq!(snap.empty, 1);
        assert_eq!(snap.connections_bound, 1);
        assert_eq!(stats.in_flight(), 1);
    }
}
