//! Managed connection source.

use crate::connection::BoundConnection;
use crate::error::{TxError, TxResult, CREDENTIALS_UNSUPPORTED};
use crate::manager::ConnectionProvider;
use boundtx_store::{ConnectionFactory, Credentials};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The connection source handed to query code.
///
/// Every connection request returns the connection bound to the caller's
/// transaction. Configuration calls are forwarded to the underlying factory
/// and have no transactional meaning.
///
/// Obtained from [`TxKit::source`](crate::TxKit::source), which guarantees
/// that the forwarded factory is the one the manager binds from.
#[derive(Clone)]
pub struct ManagedSource {
    factory: Arc<dyn ConnectionFactory>,
    provider: Arc<dyn ConnectionProvider>,
}

impl ManagedSource {
    /// Creates a source over `factory` whose connections come from
    /// `provider`.
    pub(crate) fn new(factory: Arc<dyn ConnectionFactory>, provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { factory, provider }
    }

    /// Returns the connection of the caller's transaction.
    ///
    /// # Errors
    ///
    /// Fails with a protocol violation outside a transaction.
    pub fn connection(&self) -> TxResult<BoundConnection> {
        self.provider.connection()
    }

    /// Always fails: managed connections use the factory's own credentials.
    ///
    /// # Errors
    ///
    /// Always returns a protocol violation.
    pub fn connection_as(&self, _credentials: &Credentials) -> TxResult<BoundConnection> {
        Err(TxError::protocol(CREDENTIALS_UNSUPPORTED))
    }

    /// Returns the factory's login timeout.
    pub fn login_timeout(&self) -> Duration {
        self.factory.login_timeout()
    }

    /// Sets the factory's login timeout.
    pub fn set_login_timeout(&self, timeout: Duration) {
        self.factory.set_login_timeout(timeout);
    }

    /// Returns the factory's log label.
    pub fn log_label(&self) -> Option<String> {
        self.factory.log_label()
    }

    /// Sets the factory's log label.
    pub fn set_log_label(&self, label: Option<String>) {
        self.factory.set_log_label(label);
    }

    /// Returns the underlying factory if it is a `T`.
    pub fn downcast_factory<T: ConnectionFactory + 'static>(&self) -> Option<&T> {
        self.factory.as_any().downcast_ref::<T>()
    }

    /// Returns true if the underlying factory is a `T`.
    pub fn is_wrapper_for<T: ConnectionFactory + 'static>(&self) -> bool {
        self.downcast_factory::<T>().is_some()
    }
}

impl fmt::Debug for ManagedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedSource")
            .field("log_label", &self.log_label())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TX_NOT_ACTIVE;
    use boundtx_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts requests and refuses them all.
    #[derive(Default)]
    struct NoTransaction {
        requests: AtomicUsize,
    }

    impl ConnectionProvider for NoTransaction {
        fn connection(&self) -> TxResult<BoundConnection> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Err(TxError::not_active())
        }
    }

    fn source() -> (MemoryStore, Arc<NoTransaction>, ManagedSource) {
        let store = MemoryStore::new();
        let provider = Arc::new(NoTransaction::default());
        let source = ManagedSource::new(Arc::new(store.clone()), provider.clone());
        (store, provider, source)
    }

    #[test]
    fn connection_delegates_to_provider() {
        let (store, provider, source) = source();
        let err = source.connection().unwrap_err();
        assert_eq!(err.protocol_message(), Some(TX_NOT_ACTIVE));
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
        assert_eq!(store.stats().opened(), 0);
    }

    #[test]
    fn credentials_are_unsupported() {
        let (store, provider, source) = source();
        let err = source
            .connection_as(&Credentials::new("sa", "secret"))
            .unwrap_err();
        assert_eq!(err.protocol_message(), Some(CREDENTIALS_UNSUPPORTED));
        assert_eq!(provider.requests.load(Ordering::SeqCst), 0);
        assert_eq!(store.stats().opened(), 0);
    }

    #[test]
    fn configuration_passes_through() {
        let (store, _provider, source) = source();
        source.set_login_timeout(Duration::from_secs(7));
        source.set_log_label(Some("orders".to_string()));

        assert_eq!(store.login_timeout(), Duration::from_secs(7));
        assert_eq!(store.log_label().as_deref(), Some("orders"));
        assert_eq!(source.login_timeout(), Duration::from_secs(7));
        assert_eq!(source.log_label().as_deref(), Some("orders"));
    }

    #[test]
    fn unwraps_underlying_factory() {
        let (_store, _provider, source) = source();
        assert!(source.is_wrapper_for::<MemoryStore>());
        assert!(source.downcast_factory::<MemoryStore>().is_some());
    }
}
