//! Fault injection for driver failure scenarios.

use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// A driver operation where a fault can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Opening a connection.
    Connect,
    /// Executing a statement.
    Execute,
    /// Toggling autocommit.
    SetAutoCommit,
    /// Committing.
    Commit,
    /// Rolling back.
    Rollback,
    /// Closing.
    Close,
}

impl fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Execute => "execute",
            Self::SetAutoCommit => "set_auto_commit",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// How many times an armed fault still fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Remaining {
    Times(usize),
    Always,
}

/// Set of armed faults shared by a store and all its connections.
///
/// # Example
///
/// ```rust
/// use boundtx_store::{FaultPlan, FaultPoint};
///
/// let plan = FaultPlan::new();
/// plan.arm_once(FaultPoint::Commit);
/// assert!(plan.check(FaultPoint::Commit).is_err());
/// assert!(plan.check(FaultPoint::Commit).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct FaultPlan {
    armed: Mutex<HashMap<FaultPoint, Remaining>>,
}

impl FaultPlan {
    /// Creates a plan with nothing armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `point` until it is disarmed.
    pub fn arm(&self, point: FaultPoint) {
        self.armed.lock().insert(point, Remaining::Always);
    }

    /// Arms `point` for the next `times` hits.
    pub fn arm_times(&self, point: FaultPoint, times: usize) {
        if times == 0 {
            self.disarm(point);
        } else {
            self.armed.lock().insert(point, Remaining::Times(times));
        }
    }

    /// Arms `point` for exactly one hit.
    pub fn arm_once(&self, point: FaultPoint) {
        self.arm_times(point, 1);
    }

    /// Disarms `point`.
    pub fn disarm(&self, point: FaultPoint) {
        self.armed.lock().remove(&point);
    }

    /// Disarms every point.
    pub fn clear(&self) {
        self.armed.lock().clear();
    }

    /// Fails if `point` is armed, consuming one hit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Injected` when the fault fires.
    pub fn check(&self, point: FaultPoint) -> StoreResult<()> {
        let mut armed = self.armed.lock();
        match armed.get_mut(&point) {
            None => Ok(()),
            Some(Remaining::Always) => Err(StoreError::Injected { point }),
            Some(Remaining::Times(n)) => {
                *n -= 1;
                if *n == 0 {
                    armed.remove(&point);
                }
                Err(StoreError::Injected { point })
            }
        }
    }
}
