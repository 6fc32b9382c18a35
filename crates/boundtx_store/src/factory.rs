//! Connection factory trait definition.

use crate::connection::RawConnection;
use crate::error::StoreResult;
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Explicit login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a credentials pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of raw connections.
///
/// Only [`connect`](Self::connect) carries meaning for transaction
/// demarcation. The remaining methods are configuration knobs that managed
/// wrappers forward unchanged.
///
/// # Invariants
///
/// - `connect` must be safe to call from many threads at once
/// - Every returned connection is independent of the others
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new raw connection using the factory's own credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses the connection.
    fn connect(&self) -> StoreResult<Box<dyn RawConnection>>;

    /// Opens a new raw connection with explicit credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected.
    fn connect_as(&self, credentials: &Credentials) -> StoreResult<Box<dyn RawConnection>>;

    /// Returns the login timeout.
    fn login_timeout(&self) -> Duration;

    /// Sets the login timeout.
    fn set_login_timeout(&self, timeout: Duration);

    /// Returns the label attached to the factory's log events.
    fn log_label(&self) -> Option<String>;

    /// Sets the label attached to the factory's log events.
    fn set_log_label(&self, label: Option<String>);

    /// Exposes the concrete factory for downcasting.
    fn as_any(&self) -> &dyn Any;
}
