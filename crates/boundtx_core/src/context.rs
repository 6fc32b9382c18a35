//! Per-thread transaction state.
//!
//! Each thread owns a map from manager to that manager's transaction state
//! on the thread. Only the owning thread ever touches its map, so no lock is
//! involved, and a shared manager sees a separate state per thread.

use crate::connection::BoundConnection;
use crate::types::{ManagerId, TxStatus};
use std::cell::RefCell;
use std::collections::HashMap;

/// Transaction state of one manager on one thread.
#[derive(Debug, Clone)]
pub(crate) enum TransactionState {
    /// No transaction.
    Absent,
    /// `begin` was called, no connection materialized yet.
    Pending,
    /// A connection is bound and autocommit is off.
    Active(BoundConnection),
}

impl TransactionState {
    pub(crate) fn status(&self) -> TxStatus {
        match self {
            Self::Absent => TxStatus::Absent,
            Self::Pending => TxStatus::Pending,
            Self::Active(_) => TxStatus::Active,
        }
    }
}

/// One thread's states. `Absent` is represented by a missing entry.
#[derive(Default)]
struct ContextMap(HashMap<ManagerId, TransactionState>);

impl Drop for ContextMap {
    fn drop(&mut self) {
        // Runs as a thread-local destructor: other thread-locals, including
        // those of log subscribers and drivers, may already be gone.
        for (_, state) in self.0.drain() {
            if let TransactionState::Active(conn) = state {
                conn.abandon_at_thread_exit();
            }
        }
    }
}

thread_local! {
    static CONTEXT: RefCell<ContextMap> = RefCell::new(ContextMap::default());
}

/// Returns a copy of the state; an `Active` copy shares the connection.
pub(crate) fn lookup(manager: ManagerId) -> TransactionState {
    CONTEXT.with(|cell| {
        cell.borrow()
            .0
            .get(&manager)
            .cloned()
            .unwrap_or(TransactionState::Absent)
    })
}

/// Moves `Absent` to `Pending`. Returns false and changes nothing if a
/// transaction is already present.
pub(crate) fn try_begin(manager: ManagerId) -> bool {
    CONTEXT.with(|cell| {
        let mut map = cell.borrow_mut();
        if map.0.contains_key(&manager) {
            false
        } else {
            map.0.insert(manager, TransactionState::Pending);
            true
        }
    })
}

/// Moves `Pending` to `Active`.
pub(crate) fn activate(manager: ManagerId, connection: BoundConnection) {
    let previous = CONTEXT.with(|cell| {
        cell.borrow_mut()
            .0
            .insert(manager, TransactionState::Active(connection))
    });
    debug_assert!(matches!(previous, Some(TransactionState::Pending)));
}

/// Reads and clears the state in one step.
pub(crate) fn take(manager: ManagerId) -> TransactionState {
    CONTEXT
        .with(|cell| cell.borrow_mut().0.remove(&manager))
        .unwrap_or(TransactionState::Absent)
}

/// Drops whatever state `manager` left on this thread. Safe to call while
/// the thread is shutting down.
pub(crate) fn discard(manager: ManagerId) {
    let state = CONTEXT
        .try_with(|cell| cell.try_borrow_mut().ok().and_then(|mut map| map.0.remove(&manager)))
        .ok()
        .flatten();
    // Dropped outside the borrow: an abandoned connection rolls back here.
    drop(state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use boundtx_store::{ConnectionFactory, FaultPoint, MemoryStore, Row, Statement};
    use std::thread;

    fn bound(store: &MemoryStore, manager: ManagerId) -> BoundConnection {
        let conn =
            BoundConnection::bind(store.connect().unwrap(), manager, &Config::default(), None)
                .unwrap();
        conn.execute(&Statement::insert("persons", Row::new([1])))
            .unwrap();
        conn
    }

    #[test]
    fn missing_entry_is_absent() {
        let id = ManagerId::next();
        assert_eq!(lookup(id).status(), TxStatus::Absent);
        assert_eq!(take(id).status(), TxStatus::Absent);
    }

    #[test]
    fn begin_only_once() {
        let id = ManagerId::next();
        assert!(try_begin(id));
        assert!(!try_begin(id));
        assert_eq!(lookup(id).status(), TxStatus::Pending);
        assert_eq!(take(id).status(), TxStatus::Pending);
        assert_eq!(lookup(id).status(), TxStatus::Absent);
    }

    #[test]
    fn managers_are_independent() {
        let a = ManagerId::next();
        let b = ManagerId::next();
        assert!(try_begin(a));
        assert_eq!(lookup(b).status(), TxStatus::Absent);
        assert!(try_begin(b));
        take(a);
        take(b);
    }

    #[test]
    fn threads_are_independent() {
        let id = ManagerId::next();
        assert!(try_begin(id));
        let other = thread::spawn(move || {
            let seen = lookup(id).status();
            let began = try_begin(id);
            take(id);
            (seen, began)
        })
        .join()
        .unwrap();
        assert_eq!(other, (TxStatus::Absent, true));
        assert_eq!(lookup(id).status(), TxStatus::Pending);
        discard(id);
        assert_eq!(lookup(id).status(), TxStatus::Absent);
    }

    #[test]
    fn dropping_map_rolls_back_active_connections() {
        let store = MemoryStore::new();
        store.create_table("persons");
        let id = ManagerId::next();
        let mut map = ContextMap::default();
        map.0.insert(id, TransactionState::Active(bound(&store, id)));
        map.0.insert(ManagerId::next(), TransactionState::Pending);

        drop(map);
        assert_eq!(store.committed_count("persons"), 0);
        assert_eq!(store.stats().rollbacks(), 1);
        assert_eq!(store.stats().open_now(), 0);
        assert_eq!(store.stats().abandoned(), 0);
    }

    #[test]
    fn teardown_closes_after_failed_rollback() {
        let store = MemoryStore::new();
        store.create_table("persons");
        let id = ManagerId::next();
        let conn = bound(&store, id);
        store.faults().arm_once(FaultPoint::Rollback);

        let mut map = ContextMap::default();
        map.0.insert(id, TransactionState::Active(conn.clone()));
        drop(map);

        // The failed rollback does not stop the close.
        assert!(conn.is_closed());
        assert_eq!(store.stats().open_now(), 0);
        assert_eq!(store.committed_count("persons"), 0);
    }
}
