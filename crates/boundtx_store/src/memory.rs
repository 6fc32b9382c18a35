//! In-memory transactional store.

use crate::connection::{QueryResult, RawConnection, Row, Statement, Value};
use crate::error::{StoreError, StoreResult};
use crate::factory::{ConnectionFactory, Credentials};
use crate::fault::{FaultPlan, FaultPoint};
use crate::stats::StoreStats;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    stats: StoreStats,
    faults: FaultPlan,
    next_connection: AtomicU64,
    login_timeout: Mutex<Duration>,
    log_label: RwLock<Option<String>>,
    credentials: Option<Credentials>,
}

/// An in-memory table store acting as a connection factory.
///
/// Committed rows live in a shared table map. Each connection buffers its
/// writes while autocommit is off and sees its own buffered writes on top
/// of the committed state. Other connections only see committed rows.
///
/// # Thread Safety
///
/// The store is cheap to clone and every clone refers to the same tables.
/// Connections can be opened from any number of threads at once.
///
/// # Example
///
/// ```rust
/// use boundtx_store::{ConnectionFactory, MemoryStore, RawConnection, Row, Statement};
///
/// let store = MemoryStore::new();
/// store.create_table("persons");
///
/// let mut conn = store.connect().unwrap();
/// conn.set_auto_commit(false).unwrap();
/// conn.execute(&Statement::insert("persons", Row::new([1]))).unwrap();
/// assert_eq!(store.committed_count("persons"), 0);
/// conn.commit().unwrap();
/// conn.close().unwrap();
/// assert_eq!(store.committed_count("persons"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates an empty store that accepts any credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that only accepts `credentials` in
    /// [`ConnectionFactory::connect_as`].
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            shared: Arc::new(Shared {
                credentials: Some(credentials),
                ..Shared::default()
            }),
        }
    }

    /// Creates `table` outside of any connection.
    pub fn create_table(&self, table: &str) {
        self.shared
            .tables
            .write()
            .entry(table.to_owned())
            .or_default();
    }

    /// Returns the committed rows of `table`.
    #[must_use]
    pub fn committed_rows(&self, table: &str) -> Option<Vec<Row>> {
        self.shared.tables.read().get(table).cloned()
    }

    /// Returns the number of committed rows in `table`, zero if it is missing.
    #[must_use]
    pub fn committed_count(&self, table: &str) -> usize {
        self.shared.tables.read().get(table).map_or(0, Vec::len)
    }

    /// Returns the connection counters.
    #[must_use]
    pub fn stats(&self) -> &StoreStats {
        &self.shared.stats
    }

    /// Returns the fault plan shared by all connections of this store.
    #[must_use]
    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }

    fn open(&self) -> StoreResult<Box<dyn RawConnection>> {
        self.shared.faults.check(FaultPoint::Connect)?;
        let id = self.shared.next_connection.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared.stats.record_open();
        debug!(
            connection = id,
            label = ?self.shared.log_label.read().as_deref(),
            "opened memory connection"
        );
        Ok(Box::new(MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
            auto_commit: true,
            pending: Vec::new(),
            closed: false,
        }))
    }
}

impl ConnectionFactory for MemoryStore {
    fn connect(&self) -> StoreResult<Box<dyn RawConnection>> {
        self.open()
    }

    fn connect_as(&self, credentials: &Credentials) -> StoreResult<Box<dyn RawConnection>> {
        match &self.shared.credentials {
            Some(expected) if expected != credentials => Err(StoreError::refused(format!(
                "invalid credentials for user {}",
                credentials.username
            ))),
            _ => self.open(),
        }
    }

    fn login_timeout(&self) -> Duration {
        *self.shared.login_timeout.lock()
    }

    fn set_login_timeout(&self, timeout: Duration) {
        *self.shared.login_timeout.lock() = timeout;
    }

    fn log_label(&self) -> Option<String> {
        self.shared.log_label.read().clone()
    }

    fn set_log_label(&self, label: Option<String>) {
        *self.shared.log_label.write() = label;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A buffered write not yet visible to other connections.
#[derive(Debug, Clone)]
enum PendingOp {
    Insert { table: String, row: Row },
    Delete { table: String, key: Value },
}

impl PendingOp {
    fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Delete { table, .. } => table,
        }
    }

    fn apply_rows(&self, rows: &mut Vec<Row>) {
        match self {
            Self::Insert { row, .. } => rows.push(row.clone()),
            Self::Delete { key, .. } => rows.retain(|r| r.key() != Some(key)),
        }
    }

    fn apply(&self, tables: &mut HashMap<String, Vec<Row>>) {
        if let Some(rows) = tables.get_mut(self.table()) {
            self.apply_rows(rows);
        }
    }
}

/// A connection to a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    shared: Arc<Shared>,
    auto_commit: bool,
    pending: Vec<PendingOp>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_manual_commit(&self, operation: &str) -> StoreResult<()> {
        if self.auto_commit {
            Err(StoreError::invalid_state(format!(
                "{operation} while autocommit is enabled"
            )))
        } else {
            Ok(())
        }
    }

    fn ensure_table(&self, table: &str) -> StoreResult<()> {
        if self.shared.tables.read().contains_key(table) {
            Ok(())
        } else {
            Err(StoreError::NoSuchTable(table.to_owned()))
        }
    }

    fn visible_rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        let mut rows = self
            .shared
            .tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchTable(table.to_owned()))?;
        for op in self.pending.iter().filter(|op| op.table() == table) {
            op.apply_rows(&mut rows);
        }
        Ok(rows)
    }

    fn write(&mut self, op: PendingOp) {
        if self.auto_commit {
            op.apply(&mut self.shared.tables.write());
        } else {
            self.pending.push(op);
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut tables = self.shared.tables.write();
        for op in self.pending.drain(..) {
            op.apply(&mut tables);
        }
    }
}

impl RawConnection for MemoryConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn execute(&mut self, statement: &Statement) -> StoreResult<QueryResult> {
        self.ensure_open()?;
        self.shared.faults.check(FaultPoint::Execute)?;
        self.shared.stats.record_statement();
        trace!(connection = self.id, ?statement, "execute");

        match statement {
            Statement::CreateTable { table } => {
                self.shared
                    .tables
                    .write()
                    .entry(table.clone())
                    .or_default();
                Ok(QueryResult::Affected(0))
            }
            Statement::Insert { table, row } => {
                self.ensure_table(table)?;
                self.write(PendingOp::Insert {
                    table: table.clone(),
                    row: row.clone(),
                });
                Ok(QueryResult::Affected(1))
            }
            Statement::Delete { table, key } => {
                let matched = self
                    .visible_rows(table)?
                    .iter()
                    .filter(|r| r.key() == Some(key))
                    .count() as u64;
                self.write(PendingOp::Delete {
                    table: table.clone(),
                    key: key.clone(),
                });
                Ok(QueryResult::Affected(matched))
            }
            Statement::Count { table } => {
                Ok(QueryResult::Count(self.visible_rows(table)?.len() as u64))
            }
            Statement::Select { table } => Ok(QueryResult::Rows(self.visible_rows(table)?)),
        }
    }

    fn auto_commit(&self) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, enabled: bool) -> StoreResult<()> {
        self.ensure_open()?;
        self.shared.faults.check(FaultPoint::SetAutoCommit)?;
        if enabled && !self.auto_commit {
            self.flush_pending();
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.ensure_manual_commit("commit")?;
        self.shared.faults.check(FaultPoint::Commit)?;
        self.flush_pending();
        self.shared.stats.record_commit();
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.ensure_open()?;
        self.ensure_manual_commit("rollback")?;
        self.shared.faults.check(FaultPoint::Rollback)?;
        self.pending.clear();
        self.shared.stats.record_rollback();
        Ok(())
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending.clear();
        self.shared.stats.record_close();
        debug!(connection = self.id, "closed memory connection");
        self.shared.faults.check(FaultPoint::Close)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.shared.stats.record_abandoned();
            warn!(connection = self.id, "memory connection dropped without close");
        }
    }
}
