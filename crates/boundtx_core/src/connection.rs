//! Connection bound to one transaction.

use crate::config::Config;
use crate::error::{TxError, TxResult, CONNECTION_MANAGED};
use crate::manager::ConnectionTuner;
use crate::types::ManagerId;
use boundtx_store::{QueryResult, RawConnection, Row, Statement, StoreError, StoreResult};
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{debug, warn};

/// How a transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminal {
    Commit,
    Rollback,
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("commit"),
            Self::Rollback => f.write_str("rollback"),
        }
    }
}

struct Inner {
    /// `None` once the manager has released the connection.
    raw: RefCell<Option<Box<dyn RawConnection>>>,
    id: u64,
    manager: ManagerId,
    /// Autocommit was on when the connection was bound and was switched off.
    auto_commit_forced: bool,
    restore_auto_commit: bool,
}

/// The connection handed to unit-of-work code for one transaction.
///
/// Every handle obtained within the same transaction refers to the same raw
/// connection. Handles are cheap to clone and are tied to the thread that
/// owns the transaction.
///
/// Statements pass straight through to the raw connection. Ending the
/// transaction is the manager's job: [`commit`](Self::commit),
/// [`rollback`](Self::rollback) and [`set_auto_commit`](Self::set_auto_commit)
/// are rejected with a protocol violation, and [`close`](Self::close) only
/// releases the handle. Once the transaction has ended, every statement
/// fails with `StoreError::Closed`.
#[derive(Clone)]
pub struct BoundConnection {
    inner: Rc<Inner>,
}

impl BoundConnection {
    /// Prepares a freshly opened raw connection for transactional use.
    ///
    /// Switches autocommit off if it is on, then runs the tuner. On failure
    /// the raw connection is closed and the error returned.
    pub(crate) fn bind(
        mut raw: Box<dyn RawConnection>,
        manager: ManagerId,
        config: &Config,
        tuner: Option<&ConnectionTuner>,
    ) -> TxResult<Self> {
        match prepare(raw.as_mut(), tuner) {
            Ok(auto_commit_forced) => Ok(Self {
                inner: Rc::new(Inner {
                    id: raw.id(),
                    raw: RefCell::new(Some(raw)),
                    manager,
                    auto_commit_forced,
                    restore_auto_commit: config.restore_auto_commit,
                }),
            }),
            Err(err) => {
                if let Err(close_err) = raw.close() {
                    warn!(%manager, connection = raw.id(), error = %close_err, "close after failed bind failed");
                }
                Err(err.into())
            }
        }
    }

    /// Ends the transaction on the raw connection and closes it.
    ///
    /// The connection is closed even if the terminal operation fails. The
    /// first failure is returned.
    pub(crate) fn release(&self, end: Terminal) -> TxResult<()> {
        let Some(mut raw) = self.inner.raw.borrow_mut().take() else {
            return Ok(());
        };
        let id = self.inner.id;
        let manager = self.inner.manager;

        let ended = match end {
            Terminal::Commit => raw.commit(),
            Terminal::Rollback => raw.rollback(),
        };
        let restored = if ended.is_ok() && self.inner.auto_commit_forced && self.inner.restore_auto_commit {
            raw.set_auto_commit(true)
        } else {
            Ok(())
        };
        let closed = raw.close();

        for (step, result) in [("restore auto-commit", &restored), ("close", &closed)] {
            if let Err(err) = result {
                warn!(%manager, connection = id, %end, error = %err, "{step} failed during release");
            }
        }
        debug!(%manager, connection = id, %end, ok = ended.is_ok(), "released connection");

        ended.and(restored).and(closed).map_err(TxError::from)
    }

    /// Rolls back and closes the raw connection while its thread is exiting.
    ///
    /// Nothing here logs, and a panic from the driver, or from a subscriber
    /// reached through it, is contained per step.
    pub(crate) fn abandon_at_thread_exit(self) {
        let Ok(mut slot) = self.inner.raw.try_borrow_mut() else {
            return;
        };
        let Some(mut raw) = slot.take() else {
            return;
        };
        drop(slot);
        let _ = panic::catch_unwind(AssertUnwindSafe(|| raw.rollback()));
        let _ = panic::catch_unwind(AssertUnwindSafe(|| raw.close()));
        let _ = panic::catch_unwind(AssertUnwindSafe(move || drop(raw)));
    }

    /// Returns the raw connection's identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns true if both handles refer to the same raw connection.
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns true once the transaction owning this connection has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner
            .raw
            .try_borrow()
            .map_or(false, |raw| raw.as_ref().map_or(true, |r| r.is_closed()))
    }

    /// Executes a statement on the raw connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Closed` after the transaction ended, or whatever
    /// the driver reports.
    pub fn execute(&self, statement: &Statement) -> StoreResult<QueryResult> {
        self.with_raw(|raw| raw.execute(statement))
    }

    /// Counts the rows of `table` visible to this transaction.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn count(&self, table: &str) -> StoreResult<u64> {
        self.execute(&Statement::count(table))?
            .count()
            .ok_or_else(|| StoreError::invalid_state("count returned no count"))
    }

    /// Returns the rows of `table` visible to this transaction.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn select(&self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self.execute(&Statement::select(table))?.into_rows())
    }

    /// Returns the raw connection's autocommit flag. Always false while the
    /// transaction is running.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Closed` after the transaction ended.
    pub fn auto_commit(&self) -> StoreResult<bool> {
        self.with_raw(|raw| raw.auto_commit())
    }

    /// Rejected: transactions are committed by the manager.
    ///
    /// # Errors
    ///
    /// Always returns a protocol violation.
    pub fn commit(&self) -> TxResult<()> {
        Err(self.rejected("commit"))
    }

    /// Rejected: transactions are rolled back by the manager.
    ///
    /// # Errors
    ///
    /// Always returns a protocol violation.
    pub fn rollback(&self) -> TxResult<()> {
        Err(self.rejected("rollback"))
    }

    /// Rejected: the manager owns the autocommit mode.
    ///
    /// # Errors
    ///
    /// Always returns a protocol violation.
    pub fn set_auto_commit(&self, _enabled: bool) -> TxResult<()> {
        Err(self.rejected("set_auto_commit"))
    }

    /// Releases this handle. The raw connection stays bound to the
    /// transaction until the manager ends it.
    pub fn close(self) {}

    fn rejected(&self, operation: &'static str) -> TxError {
        warn!(
            manager = %self.inner.manager,
            connection = self.inner.id,
            operation,
            "unit of work tried to end its own transaction"
        );
        TxError::protocol(CONNECTION_MANAGED)
    }

    fn with_raw<R>(
        &self,
        f: impl FnOnce(&mut dyn RawConnection) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut slot = self
            .inner
            .raw
            .try_borrow_mut()
            .map_err(|_| StoreError::invalid_state("connection is busy"))?;
        match slot.as_mut() {
            Some(raw) => f(raw.as_mut()),
            None => Err(StoreError::Closed),
        }
    }
}

fn prepare(raw: &mut dyn RawConnection, tuner: Option<&ConnectionTuner>) -> StoreResult<bool> {
    let forced = if raw.auto_commit()? {
        raw.set_auto_commit(false)?;
        true
    } else {
        false
    };
    if let Some(tune) = tuner {
        tune(raw)?;
    }
    Ok(forced)
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Reached with a connection only when a manager is dropped while
        // the current thread's transaction is still active.
        let Some(mut raw) = self.raw.get_mut().take() else {
            return;
        };
        warn!(manager = %self.manager, connection = self.id, "rolling back abandoned transaction");
        if let Err(err) = raw.rollback() {
            warn!(manager = %self.manager, connection = self.id, error = %err, "rollback of abandoned transaction failed");
        }
        if let Err(err) = raw.close() {
            warn!(manager = %self.manager, connection = self.id, error = %err, "close of abandoned connection failed");
        }
    }
}

impl fmt::Debug for BoundConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundConnection")
            .field("id", &self.inner.id)
            .field("manager", &self.inner.manager)
            .field("auto_commit_forced", &self.inner.auto_commit_forced)
            .field("closed", &self.is_closed())
            .finish()
    }
}
