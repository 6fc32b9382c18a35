//! Raw connection trait and the statement model it executes.

use crate::error::StoreResult;
use std::fmt;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "x'{}'", v.len()),
        }
    }
}

/// A table row. The first value acts as the row key for deletes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<Value>);

impl Row {
    /// Creates a row from anything convertible into values.
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    /// Returns the key column, if the row has any columns.
    #[must_use]
    pub fn key(&self) -> Option<&Value> {
        self.0.first()
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }
}

/// A statement understood by raw connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Creates a table if it does not exist yet. Applied immediately.
    CreateTable {
        /// Table name.
        table: String,
    },
    /// Inserts one row.
    Insert {
        /// Table name.
        table: String,
        /// Row to insert.
        row: Row,
    },
    /// Deletes every row whose key equals `key`.
    Delete {
        /// Table name.
        table: String,
        /// Key to match.
        key: Value,
    },
    /// Counts the rows visible to this connection.
    Count {
        /// Table name.
        table: String,
    },
    /// Returns the rows visible to this connection.
    Select {
        /// Table name.
        table: String,
    },
}

impl Statement {
    /// `CREATE TABLE IF NOT EXISTS`.
    pub fn create_table(table: impl Into<String>) -> Self {
        Self::CreateTable {
            table: table.into(),
        }
    }

    /// `INSERT INTO table VALUES (...)`.
    pub fn insert(table: impl Into<String>, row: Row) -> Self {
        Self::Insert {
            table: table.into(),
            row,
        }
    }

    /// `DELETE FROM table WHERE key = ...`.
    pub fn delete(table: impl Into<String>, key: impl Into<Value>) -> Self {
        Self::Delete {
            table: table.into(),
            key: key.into(),
        }
    }

    /// `SELECT COUNT(*) FROM table`.
    pub fn count(table: impl Into<String>) -> Self {
        Self::Count {
            table: table.into(),
        }
    }

    /// `SELECT * FROM table`.
    pub fn select(table: impl Into<String>) -> Self {
        Self::Select {
            table: table.into(),
        }
    }

    /// Returns the table the statement targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table }
            | Self::Insert { table, .. }
            | Self::Delete { table, .. }
            | Self::Count { table }
            | Self::Select { table } => table,
        }
    }
}

/// Outcome of executing a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// Number of rows affected by a write.
    Affected(u64),
    /// Result of a count.
    Count(u64),
    /// Rows returned by a select.
    Rows(Vec<Row>),
}

impl QueryResult {
    /// Rows affected, or zero for reads.
    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::Affected(n) => *n,
            _ => 0,
        }
    }

    /// The count, if this is the result of a count.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// Consumes the result and returns its rows, empty for non-selects.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }
}

/// An unmanaged connection handed out by a [`crate::ConnectionFactory`].
///
/// Connections start in autocommit mode. With autocommit off, writes are
/// buffered until `commit` or discarded by `rollback`/`close`.
///
/// # Invariants
///
/// - Every operation on a closed connection fails with `StoreError::Closed`,
///   except `close` itself, which is idempotent
/// - `commit` and `rollback` fail while autocommit is on
/// - Connections are `Send` so a factory may hand them to any thread
pub trait RawConnection: Send {
    /// Returns an identifier unique within the factory that opened it.
    fn id(&self) -> u64;

    /// Executes a statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed, the table is unknown,
    /// or the driver fails.
    fn execute(&mut self, statement: &Statement) -> StoreResult<QueryResult>;

    /// Returns whether autocommit is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn auto_commit(&self) -> StoreResult<bool>;

    /// Enables or disables autocommit. Enabling it commits buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the driver fails.
    fn set_auto_commit(&mut self, enabled: bool) -> StoreResult<()>;

    /// Makes buffered writes visible to other connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed, in autocommit mode,
    /// or the driver fails.
    fn commit(&mut self) -> StoreResult<()>;

    /// Discards buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed, in autocommit mode,
    /// or the driver fails.
    fn rollback(&mut self) -> StoreResult<()>;

    /// Releases the connection. Buffered writes are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails. The connection counts as
    /// closed afterwards either way.
    fn close(&mut self) -> StoreResult<()>;

    /// Returns whether `close` has been called.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_key_is_first_value() {
        let row = Row::new([Value::from(7), Value::from("Mr Foo")]);
        assert_eq!(row.key(), Some(&Value::Integer(7)));
        assert_eq!(row.get(1), Some(&Value::Text("Mr Foo".into())));
        assert!(Row::default().key().is_none());
    }

    #[test]
    fn statement_table() {
        assert_eq!(Statement::count("persons").table(), "persons");
        assert_eq!(Statement::delete("persons", 1).table(), "persons");
    }

    #[test]
    fn query_result_accessors() {
        assert_eq!(QueryResult::Affected(3).affected(), 3);
        assert_eq!(QueryResult::Count(3).affected(), 0);
        assert_eq!(QueryResult::Count(5).count(), Some(5));
        assert!(QueryResult::Affected(1).into_rows().is_empty());
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("a").to_string(), "'a'");
        assert_eq!(Value::from(42i64).to_string(), "42");
    }
}
