//! Named connection pools.
//!
//! A [`PoolRegistry`] is built once from a [`RegistryConfig`], opens every
//! pool's floor of connections, and is then shared behind an `Arc`. The
//! set of pools never changes after initialization.

use crate::pool::connection::{Backend, Connection, Endpoint};
use crate::pool::resource::{ResourcePool, ResourcePoolConfig, ResourcePoolError};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use strand_core::config::RegistryConfig;
use strand_core::error::ConfigError;
use strand_core::utils::clock::{Clock, SystemClock};
use thiserror::Error;

/// Error raised by the registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The configuration is unusable
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// No pool is registered under this name
    #[error("no pool named `{0}`")]
    UnknownPool(String),

    /// The named pool failed
    #[error("pool `{pool}`: {source}")]
    Pool {
        /// Pool name
        pool: String,
        /// Underlying failure
        #[source]
        source: ResourcePoolError,
    },
}

/// Pools keyed by name
pub struct PoolRegistry<B: Backend> {
    pools: HashMap<String, Arc<ResourcePool<B>>>,
}

impl<B: Backend> PoolRegistry<B> {
    /// Build every configured pool and open its floor of connections.
    ///
    /// If any pool fails, the pools built so far are torn down and the
    /// whole initialization fails.
    pub fn initialize(config: &RegistryConfig, backend: Arc<B>) -> Result<Arc<Self>, RegistryError> {
        Self::initialize_with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Like [`initialize`](Self::initialize), with connections reading
    /// time from `clock`
    pub fn initialize_with_clock(
        config: &RegistryConfig,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, RegistryError> {
        config.validate()?;

        let mut pools: HashMap<String, Arc<ResourcePool<B>>> =
            HashMap::with_capacity(config.pools.len());
        for (name, settings) in &config.pools {
            let pool = ResourcePool::with_clock(
                name.clone(),
                Endpoint::from(settings),
                ResourcePoolConfig::from(settings),
                Arc::clone(&backend),
                Arc::clone(&clock),
            );
            if let Err(source) = pool.initialize() {
                error!("Registry initialization failed at pool `{}`: {}", name, source);
                pool.teardown();
                for built in pools.values() {
                    built.teardown();
                }
                return Err(RegistryError::Pool {
                    pool: name.clone(),
                    source,
                });
            }
            pools.insert(name.clone(), pool);
        }

        info!("Pool registry initialized with {} pools", pools.len());
        Ok(Arc::new(Self { pools }))
    }

    /// The pool registered under `name`
    pub fn pool(&self, name: &str) -> Result<&Arc<ResourcePool<B>>, RegistryError> {
        self.pools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownPool(name.to_string()))
    }

    /// Every pool name, sorted
    pub fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Take a connection from the named pool; see [`ResourcePool::acquire`]
    pub fn acquire(&self, name: &str, timeout_ms: i64) -> Result<Connection<B>, RegistryError> {
        self.pool(name)?
            .acquire(timeout_ms)
            .map_err(|source| RegistryError::Pool {
                pool: name.to_string(),
                source,
            })
    }

    /// Take a connection from the named pool without waiting
    pub fn try_acquire(&self, name: &str) -> Result<Connection<B>, RegistryError> {
        self.pool(name)?
            .try_acquire()
            .map_err(|source| RegistryError::Pool {
                pool: name.to_string(),
                source,
            })
    }

    /// Return a connection to the pool it was taken from.
    ///
    /// A connection tagged with an unknown pool name is closed.
    pub fn release(&self, conn: Connection<B>) {
        match self.pools.get(conn.pool_name()) {
            Some(pool) => pool.release(conn),
            None => warn!(
                "Released connection {} names unknown pool `{}`, closing it",
                conn.id().short(),
                conn.pool_name()
            ),
        }
    }

    /// Take a connection that goes back to its pool when the guard drops
    pub fn acquire_scoped(
        &self,
        name: &str,
        timeout_ms: i64,
    ) -> Result<PooledConnection<'_, B>, RegistryError> {
        let conn = self.acquire(name, timeout_ms)?;
        Ok(self.scoped(conn))
    }

    /// Wrap an already acquired connection in a releasing guard
    pub fn scoped(&self, conn: Connection<B>) -> PooledConnection<'_, B> {
        PooledConnection {
            registry: self,
            conn: Some(conn),
        }
    }

    /// Tear down every pool
    pub fn teardown(&self) {
        info!("Tearing down {} pools", self.pools.len());
        for pool in self.pools.values() {
            pool.teardown();
        }
    }
}

impl<B: Backend> fmt::Debug for PoolRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pool_names())
            .finish()
    }
}

/// A connection on loan from a [`PoolRegistry`], released when dropped
pub struct PooledConnection<'a, B: Backend> {
    registry: &'a PoolRegistry<B>,
    conn: Option<Connection<B>>,
}

impl<B: Backend> PooledConnection<'_, B> {
    /// Keep the connection instead of releasing it on drop.
    ///
    /// The caller becomes responsible for [`PoolRegistry::release`].
    pub fn detach(mut self) -> Connection<B> {
        self.conn.take().expect("connection already returned")
    }
}

impl<B: Backend> Deref for PooledConnection<'_, B> {
    type Target = Connection<B>;

    fn deref(&self) -> &Connection<B> {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl<B: Backend> DerefMut for PooledConnection<'_, B> {
    fn deref_mut(&mut self) -> &mut Connection<B> {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl<B: Backend> Drop for PooledConnection<'_, B> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.registry.release(conn);
        }
    }
}

/// Holds a registry that is initialized at most once
pub struct RegistryCell<B: Backend> {
    inner: Mutex<Option<Arc<PoolRegistry<B>>>>,
}

impl<B: Backend> Default for RegistryCell<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> RegistryCell<B> {
    /// An empty cell
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// The registry, initializing it from `config` on first use.
    ///
    /// A failed initialization leaves the cell empty, so a later call
    /// tries again.
    pub fn get_or_initialize(
        &self,
        config: &RegistryConfig,
        backend: Arc<B>,
    ) -> Result<Arc<PoolRegistry<B>>, RegistryError> {
        let mut inner = self.inner.lock();
        if let Some(registry) = inner.as_ref() {
            return Ok(Arc::clone(registry));
        }
        let registry = PoolRegistry::initialize(config, backend)?;
        *inner = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// The registry, if it has been initialized
    pub fn get(&self) -> Option<Arc<PoolRegistry<B>>> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connection::{Command, Reply};
    use crate::pool::memory::MemoryBackend;
    use strand_core::config::PoolSettings;

    fn config() -> RegistryConfig {
        let mut sessions = PoolSettings::new("10.0.0.1", 6379, 1, 3);
        sessions.min_connections = 1;
        RegistryConfig::default()
            .with_pool("sessions", sessions)
            .with_pool("tokens", PoolSettings::new("10.0.0.2", 6379, 0, 2))
    }

    #[test]
    fn test_initialize_builds_every_pool() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = PoolRegistry::initialize(&config(), Arc::clone(&backend)).unwrap();

        assert_eq!(registry.pool_names(), vec!["sessions", "tokens"]);
        assert_eq!(registry.pool("sessions").unwrap().idle_count(), 1);
        assert_eq!(registry.pool("tokens").unwrap().idle_count(), 2);
        assert_eq!(registry.pool("tokens").unwrap().endpoint().host, "10.0.0.2");
        assert_eq!(backend.open_handles(), 3);
    }

    #[test]
    fn test_initialize_fails_as_a_whole() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_reachable(false);

        let err = PoolRegistry::initialize(&config(), Arc::clone(&backend)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Pool {
                source: ResourcePoolError::ConnectFailed(_),
                ..
            }
        ));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let err = PoolRegistry::initialize(&RegistryConfig::default(), backend).unwrap_err();
        assert!(matches!(err, RegistryError::Config(ConfigError::NoPools(_))));
    }

    #[test]
    fn test_unknown_pool() {
        let registry = PoolRegistry::initialize(&config(), Arc::new(MemoryBackend::new())).unwrap();
        assert!(matches!(
            registry.acquire("missing", 10),
            Err(RegistryError::UnknownPool(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_release_routes_by_pool_name() {
        let registry = PoolRegistry::initialize(&config(), Arc::new(MemoryBackend::new())).unwrap();

        let conn = registry.acquire("sessions", 0).unwrap();
        assert_eq!(conn.pool_name(), "sessions");
        assert_eq!(conn.endpoint().db_index, 1);
        assert_eq!(registry.pool("sessions").unwrap().idle_count(), 0);

        registry.release(conn);
        assert_eq!(registry.pool("sessions").unwrap().idle_count(), 1);
        assert_eq!(registry.pool("tokens").unwrap().idle_count(), 2);
    }

    #[test]
    fn test_scoped_connection_releases_on_drop() {
        let registry = PoolRegistry::initialize(&config(), Arc::new(MemoryBackend::new())).unwrap();
        let pool = Arc::clone(registry.pool("tokens").unwrap());

        {
            let mut conn = registry.acquire_scoped("tokens", 0).unwrap();
            assert_eq!(pool.on_loan_count(), 1);
            assert!(conn.execute(&Command::new("SET").arg("k").arg("v")).unwrap().is_ok());
            assert_eq!(
                conn.execute(&Command::new("GET").arg("k")).unwrap(),
                Reply::Bulk(b"v".to_vec())
            );
        }
        assert_eq!(pool.on_loan_count(), 0);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_detach_keeps_the_connection() {
        let registry = PoolRegistry::initialize(&config(), Arc::new(MemoryBackend::new())).unwrap();
        let pool = Arc::clone(registry.pool("sessions").unwrap());

        let conn = registry.acquire_scoped("sessions", 0).unwrap().detach();
        assert_eq!(pool.on_loan_count(), 1);

        registry.release(conn);
        assert_eq!(pool.on_loan_count(), 0);
    }

    #[test]
    fn test_teardown_aborts_every_pool() {
        let backend = Arc::new(MemoryBackend::new());
        let registry = PoolRegistry::initialize(&config(), Arc::clone(&backend)).unwrap();

        registry.teardown();
        assert!(matches!(
            registry.acquire("sessions", 10),
            Err(RegistryError::Pool {
                source: ResourcePoolError::Aborted,
                ..
            })
        ));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_cell_initializes_once() {
        let cell = RegistryCell::new();
        assert!(cell.get().is_none());

        let backend = Arc::new(MemoryBackend::new());
        let first = cell.get_or_initialize(&config(), Arc::clone(&backend)).unwrap();
        let second = cell.get_or_initialize(&config(), Arc::clone(&backend)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &cell.get().unwrap()));
        assert_eq!(backend.connect_count(), 3);
    }

    #[test]
    fn test_cell_retries_after_failure() {
        let cell = RegistryCell::new();
        let backend = Arc::new(MemoryBackend::new());

        backend.set_reachable(false);
        assert!(cell.get_or_initialize(&config(), Arc::clone(&backend)).is_err());
        assert!(cell.get().is_none());

        backend.set_reachable(true);
        assert!(cell.get_or_initialize(&config(), backend).is_ok());
    }
}
