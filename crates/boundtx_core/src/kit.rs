//! Manager and managed source wired over one factory.

use crate::config::Config;
use crate::manager::{ConnectionProvider, ConnectionTuner, TransactionManager};
use crate::source::ManagedSource;
use boundtx_store::{ConnectionFactory, RawConnection, StoreResult};
use std::fmt;
use std::sync::Arc;

/// A transaction manager plus the connection source that reads from it.
///
/// Keep [`manager`](Self::manager) for demarcation and give
/// [`source`](Self::source) to query code.
///
/// ```
/// use boundtx_core::TxKit;
/// use boundtx_store::{MemoryStore, Row, Statement};
/// use std::sync::Arc;
///
/// let store = MemoryStore::new();
/// store.create_table("persons");
/// let kit = TxKit::new(Arc::new(store.clone()));
///
/// let source = kit.source().clone();
/// kit.manager()
///     .tx(|| {
///         source
///             .connection()?
///             .execute(&Statement::insert("persons", Row::new([1])))?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(store.committed_count("persons"), 1);
/// ```
#[derive(Clone)]
pub struct TxKit {
    manager: Arc<TransactionManager>,
    source: ManagedSource,
}

impl TxKit {
    /// Wires a kit with the default configuration and no tuner.
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self::builder(factory).build()
    }

    /// Starts building a kit over `factory`.
    pub fn builder(factory: Arc<dyn ConnectionFactory>) -> TxKitBuilder {
        TxKitBuilder {
            factory,
            config: Config::default(),
            tuner: None,
        }
    }

    /// Returns the transaction manager.
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Returns the managed connection source.
    pub fn source(&self) -> &ManagedSource {
        &self.source
    }
}

impl fmt::Debug for TxKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxKit")
            .field("manager", &self.manager)
            .field("source", &self.source)
            .finish()
    }
}

/// Builder for [`TxKit`].
pub struct TxKitBuilder {
    factory: Arc<dyn ConnectionFactory>,
    config: Config,
    tuner: Option<ConnectionTuner>,
}

impl TxKitBuilder {
    /// Sets the manager configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the hook run once on every newly bound raw connection.
    #[must_use]
    pub fn tuner<F>(mut self, tuner: F) -> Self
    where
        F: Fn(&mut dyn RawConnection) -> StoreResult<()> + Send + Sync + 'static,
    {
        self.tuner = Some(Arc::new(tuner));
        self
    }

    /// Builds the kit.
    pub fn build(self) -> TxKit {
        let manager = Arc::new(TransactionManager::with_config(
            Arc::clone(&self.factory),
            self.config,
            self.tuner,
        ));
        let provider: Arc<dyn ConnectionProvider> = manager.clone();
        TxKit {
            source: ManagedSource::new(self.factory, provider),
            manager,
        }
    }
}

impl fmt::Debug for TxKitBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxKitBuilder")
            .field("config", &self.config)
            .field("tuner", &self.tuner.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TX_NOT_ACTIVE;
    use crate::types::TxStatus;
    use boundtx_store::{MemoryStore, Row, Statement, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("persons");
        store
    }

    #[test]
    fn source_reads_managers_transaction() {
        let store = store();
        let kit = TxKit::new(Arc::new(store.clone()));
        let manager = kit.manager();
        let source = kit.source();

        assert_eq!(
            source.connection().unwrap_err().protocol_message(),
            Some(TX_NOT_ACTIVE)
        );

        manager.begin().unwrap();
        let a = source.connection().unwrap();
        a.execute(&Statement::insert("persons", Row::new([1])))
            .unwrap();
        let b = source.connection().unwrap();
        assert!(a.same_connection(&b));
        assert_eq!(b.count("persons").unwrap(), 1);
        assert_eq!(manager.status(), TxStatus::Active);
        manager.commit().unwrap();

        assert_eq!(store.committed_count("persons"), 1);
    }

    #[test]
    fn builder_applies_config_and_tuner() {
        let store = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let kit = TxKit::builder(Arc::new(store.clone()))
            .config(Config::new().name("orders"))
            .tuner(move |raw: &mut dyn RawConnection| -> StoreResult<()> {
                if raw.auto_commit()? {
                    return Err(StoreError::invalid_state("autocommit still on"));
                }
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        assert_eq!(kit.manager().config().name.as_deref(), Some("orders"));
        kit.manager()
            .tx(|| {
                kit.source().connection()?;
                kit.source().connection()?;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn source_configures_the_managers_factory() {
        let store = store();
        let kit = TxKit::new(Arc::new(store.clone()));
        kit.source().set_login_timeout(Duration::from_secs(7));
        assert_eq!(store.login_timeout(), Duration::from_secs(7));

        kit.manager().begin().unwrap();
        kit.source().connection().unwrap();
        kit.manager().rollback().unwrap();
        assert_eq!(store.stats().opened(), 1);
    }

    #[test]
    fn clones_share_the_manager() {
        let kit = TxKit::new(Arc::new(store()));
        let copy = kit.clone();
        kit.manager().begin().unwrap();
        assert!(copy.manager().is_active());
        assert!(copy.source().connection().is_ok());
        copy.manager().rollback().unwrap();
    }
}
