//! Core type definitions for boundtx.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction manager instance.
///
/// Manager IDs are monotonically increasing and never reused within a
/// process, so a context entry left behind by a dropped manager can never be
/// picked up by a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagerId(u64);

impl ManagerId {
    /// Allocates the next unused ID.
    pub(crate) fn next() -> Self {
        Self(NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txm:{}", self.0)
    }
}

/// Transaction status of the calling context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// No transaction.
    Absent,
    /// `begin` was called, no connection has been requested yet.
    Pending,
    /// A connection is bound to the transaction.
    Active,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Pending => "pending",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}
