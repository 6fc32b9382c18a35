//! Thread-bound transaction manager.

use crate::config::Config;
use crate::connection::{BoundConnection, Terminal};
use crate::context::{self, TransactionState};
use crate::error::{BoxError, TxError, TxResult};
use crate::stats::TxStats;
use crate::types::{ManagerId, TxStatus};
use boundtx_store::{ConnectionFactory, RawConnection, StoreResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Hook applied once to every raw connection the manager binds, after
/// autocommit has been switched off.
pub type ConnectionTuner = Arc<dyn Fn(&mut dyn RawConnection) -> StoreResult<()> + Send + Sync>;

/// Hands out the connection of the calling context's transaction.
pub trait ConnectionProvider: Send + Sync {
    /// Returns the connection bound to the caller's transaction, binding one
    /// on first use.
    ///
    /// # Errors
    ///
    /// Fails with a protocol violation when the caller has no transaction,
    /// or with a transaction failure when the store cannot supply one.
    fn connection(&self) -> TxResult<BoundConnection>;
}

/// Demarcates transactions per thread over one connection factory.
///
/// One manager is shared by any number of threads. Each thread sees its own
/// transaction state:
///
/// - `begin` marks a transaction as pending without touching the store.
/// - The first connection request inside the transaction opens a raw
///   connection, switches autocommit off and binds it.
/// - `commit` and `rollback` clear the state first, then end and close the
///   bound connection if there is one.
///
/// ```
/// use boundtx_core::{ConnectionProvider, TransactionManager};
/// use boundtx_store::{MemoryStore, Row, Statement};
/// use std::sync::Arc;
///
/// let store = MemoryStore::new();
/// store.create_table("persons");
/// let manager = TransactionManager::new(Arc::new(store.clone()));
///
/// manager.begin().unwrap();
/// let conn = manager.connection().unwrap();
/// conn.execute(&Statement::insert("persons", Row::new([1]))).unwrap();
/// manager.commit().unwrap();
///
/// assert_eq!(store.committed_count("persons"), 1);
/// ```
pub struct TransactionManager {
    id: ManagerId,
    factory: Arc<dyn ConnectionFactory>,
    tuner: Option<ConnectionTuner>,
    config: Config,
    stats: TxStats,
}

impl TransactionManager {
    /// Creates a manager with the default configuration and no tuner.
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::with_config(factory, Config::default(), None)
    }

    /// Creates a manager with an explicit configuration and tuner.
    pub fn with_config(
        factory: Arc<dyn ConnectionFactory>,
        config: Config,
        tuner: Option<ConnectionTuner>,
    ) -> Self {
        let id = ManagerId::next();
        debug!(manager = %id, name = config.name.as_deref(), "created transaction manager");
        Self {
            id,
            factory,
            tuner,
            config,
            stats: TxStats::new(),
        }
    }

    /// Returns this manager's identifier.
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the counters shared by all threads using this manager.
    pub fn stats(&self) -> &TxStats {
        &self.stats
    }

    /// Returns the calling thread's transaction status.
    pub fn status(&self) -> TxStatus {
        context::lookup(self.id).status()
    }

    /// Returns true if the calling thread has a pending or active transaction.
    pub fn is_active(&self) -> bool {
        self.status() != TxStatus::Absent
    }

    /// Starts a transaction on the calling thread.
    ///
    /// No connection is opened until the transaction first asks for one.
    ///
    /// # Errors
    ///
    /// Fails with a protocol violation if a transaction is already pending
    /// or active on this thread.
    pub fn begin(&self) -> TxResult<()> {
        if !context::try_begin(self.id) {
            return Err(TxError::already_active());
        }
        self.stats.record_begin();
        debug!(manager = %self.id, name = self.name(), "transaction begun");
        Ok(())
    }

    /// Returns the connection bound to the calling thread's transaction.
    pub(crate) fn acquire(&self) -> TxResult<BoundConnection> {
        match context::lookup(self.id) {
            TransactionState::Absent => Err(TxError::not_active()),
            TransactionState::Active(conn) => Ok(conn),
            TransactionState::Pending => {
                let raw = self.factory.connect()?;
                let conn = BoundConnection::bind(raw, self.id, &self.config, self.tuner.as_ref())?;
                context::activate(self.id, conn.clone());
                self.stats.record_bound();
                debug!(manager = %self.id, name = self.name(), connection = conn.id(), "bound connection");
                Ok(conn)
            }
        }
    }

    /// Commits the calling thread's transaction.
    ///
    /// The thread's state is cleared before the store is touched, so a new
    /// transaction can begin even if the commit fails. The bound connection,
    /// if any, is closed in every case.
    ///
    /// # Errors
    ///
    /// Fails with a protocol violation without a transaction, or with a
    /// transaction failure if the store fails to commit or close.
    pub fn commit(&self) -> TxResult<()> {
        self.finish(Terminal::Commit)
    }

    /// Rolls back the calling thread's transaction.
    ///
    /// Same clearing and closing guarantees as [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Fails with a protocol violation without a transaction, or with a
    /// transaction failure if the store fails to roll back or close.
    pub fn rollback(&self) -> TxResult<()> {
        self.finish(Terminal::Rollback)
    }

    fn finish(&self, end: Terminal) -> TxResult<()> {
        match context::take(self.id) {
            TransactionState::Absent => Err(TxError::not_active()),
            TransactionState::Pending => {
                self.stats.record_end(end, false);
                debug!(manager = %self.id, name = self.name(), %end, "ended transaction without connection");
                Ok(())
            }
            TransactionState::Active(conn) => {
                let result = conn.release(end);
                self.stats.record_end(end, true);
                if let Err(err) = &result {
                    self.stats.record_release_failure();
                    warn!(manager = %self.id, name = self.name(), connection = conn.id(), %end, error = %err, "terminal operation failed");
                } else {
                    debug!(manager = %self.id, name = self.name(), connection = conn.id(), %end, "transaction ended");
                }
                result
            }
        }
    }

    /// Runs `unit` in a new transaction and returns its value.
    ///
    /// Commits when `unit` succeeds. Rolls back when it fails or panics,
    /// unless the commit was already issued. The unit's error is returned
    /// unchanged; manager errors are converted into `E`.
    ///
    /// If the rollback after a failed unit is itself a protocol violation,
    /// for example because the unit ended the transaction on its own, that
    /// violation is returned instead of the unit's error. A store failure
    /// during that rollback is logged and the unit's error wins.
    ///
    /// # Errors
    ///
    /// Returns the unit's error, or a converted [`TxError`] from begin,
    /// commit, or a misused rollback.
    pub fn tx_unwrapped_result<T, E, F>(&self, unit: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<TxError>,
    {
        self.begin()?;
        let guard = RollbackGuard {
            manager: self,
            before_commit: true,
        };
        match unit() {
            Ok(value) => {
                guard.disarm();
                self.commit()?;
                Ok(value)
            }
            Err(err) => match guard.rollback() {
                Some(violation) => Err(violation.into()),
                None => Err(err),
            },
        }
    }

    /// Runs `unit` in a new transaction, propagating its error unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`tx_unwrapped_result`](Self::tx_unwrapped_result).
    pub fn tx_unwrapped<E, F>(&self, unit: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
        E: From<TxError>,
    {
        self.tx_unwrapped_result(unit)
    }

    /// Runs `unit` in a new transaction and returns its value.
    ///
    /// A failure of `unit` that is not already a [`TxError`] is wrapped in
    /// [`TxError::TransactionFailure`], keeping the original as its source.
    ///
    /// # Errors
    ///
    /// Returns a [`TxError`] for any failure.
    pub fn tx_result<T, F>(&self, unit: F) -> TxResult<T>
    where
        F: FnOnce() -> Result<T, BoxError>,
    {
        self.tx_unwrapped_result(unit).map_err(TxError::from_unit)
    }

    /// Runs `unit` in a new transaction, wrapping its failure.
    ///
    /// # Errors
    ///
    /// Same as [`tx_result`](Self::tx_result).
    pub fn tx<F>(&self, unit: F) -> TxResult<()>
    where
        F: FnOnce() -> Result<(), BoxError>,
    {
        self.tx_result(unit)
    }

    fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("")
    }
}

impl ConnectionProvider for TransactionManager {
    fn connection(&self) -> TxResult<BoundConnection> {
        self.acquire()
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        // Other threads drop their entries when they exit.
        context::discard(self.id);
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("tuner", &self.tuner.is_some())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// Rolls back the transaction unless the unit of work got as far as commit.
struct RollbackGuard<'a> {
    manager: &'a TransactionManager,
    before_commit: bool,
}

impl RollbackGuard<'_> {
    fn disarm(mut self) {
        self.before_commit = false;
    }

    /// Rolls back now. Returns the rollback's error only if it is a
    /// protocol violation; store failures are logged.
    fn rollback(mut self) -> Option<TxError> {
        self.before_commit = false;
        match self.manager.rollback() {
            Ok(()) => None,
            Err(err) if err.is_protocol_violation() => {
                warn!(
                    manager = %self.manager.id,
                    name = self.manager.name(),
                    error = %err,
                    "unit of work ended its own transaction before failing"
                );
                Some(err)
            }
            Err(err) => {
                error!(
                    manager = %self.manager.id,
                    name = self.manager.name(),
                    error = %err,
                    "rollback after failed unit of work failed"
                );
                None
            }
        }
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if !self.before_commit {
            return;
        }
        // Only reached while a panic unwinds out of the unit of work.
        warn!(manager = %self.manager.id, name = self.manager.name(), "unit of work panicked, rolling back");
        if let Err(err) = self.manager.rollback() {
            error!(manager = %self.manager.id, name = self.manager.name(), error = %err, "rollback during unwind failed");
        }
    }
}
