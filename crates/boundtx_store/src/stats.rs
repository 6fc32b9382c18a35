//! Connection accounting for the in-memory store.
//!
//! Lets tests assert that every connection a store hands out is closed
//! exactly once and that commits and rollbacks reach the driver.

use std::sync::atomic::{AtomicU64, Ordering};

/// Driver-level counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Connections handed out.
    opened: AtomicU64,
    /// Connections closed through `close`.
    closed: AtomicU64,
    /// Connections dropped without `close`.
    abandoned: AtomicU64,
    /// Successful physical commits.
    commits: AtomicU64,
    /// Successful physical rollbacks.
    rollbacks: AtomicU64,
    /// Statements executed.
    statements: AtomicU64,
}

impl StoreStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of connections opened.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Returns the number of connections closed.
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    /// Returns the number of connections dropped while still open.
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// Returns the number of connections currently open.
    pub fn open_now(&self) -> u64 {
        self.opened()
            .saturating_sub(self.closed())
            .saturating_sub(self.abandoned())
    }

    /// Returns the number of successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of successful rollbacks.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Returns the number of statements executed.
    pub fn statements(&self) -> u64 {
        self.statements.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            opened: self.opened(),
            closed: self.closed(),
            abandoned: self.abandoned(),
            commits: self.commits(),
            rollbacks: self.rollbacks(),
            statements: self.statements(),
        }
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStatsSnapshot {
    /// Connections handed out.
    pub opened: u64,
    /// Connections closed through `close`.
    pub closed: u64,
    /// Connections dropped without `close`.
    pub abandoned: u64,
    /// Successful physical commits.
    pub commits: u64,
    /// Successful physical rollbacks.
    pub rollbacks: u64,
    /// Statements executed.
    pub statements: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = StoreStats::new();
        assert_eq!(stats.snapshot(), StoreStatsSnapshot::default());
    }

    #[test]
    fn open_now_tracks_closes_and_abandons() {
        let stats = StoreStats::new();
        stats.record_open();
        stats.record_open();
        stats.record_open();
        stats.record_close();
        stats.record_abandoned();
        assert_eq!(stats.open_now(), 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(StoreStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_open();
                        s.record_close();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.opened(), 800);
        assert_eq!(stats.closed(), 800);
        assert_eq!(stats.open_now(), 0);
    }
}
