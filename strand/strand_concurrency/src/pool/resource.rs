//! Bounded pools of connections to one endpoint.
//!
//! A pool opens a floor of connections when initialized and grows lazily
//! up to its maximum. Callers that find it full wait on a condition
//! variable for a release, a timeout, or teardown. Connects happen with
//! the pool lock released: the slot is reserved first and given back if
//! the connect fails.

use crate::pool::connection::{Backend, ConnectError, Connection, Endpoint};
use log::{debug, error, info, trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use strand_core::config::{PoolSettings, DEFAULT_MIN_CONNECTIONS};
use strand_core::id::ConnectionId;
use strand_core::utils::clock::{Clock, SystemClock};
use thiserror::Error;

/// Error returned when a connection cannot be acquired from the pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourcePoolError {
    /// No connection was released before the deadline
    #[error("timed out after {0}ms waiting for a connection")]
    Timeout(u64),

    /// The pool is at its maximum and every connection is on loan
    #[error("resource pool exhausted")]
    Exhausted,

    /// The pool has been torn down
    #[error("resource pool has been torn down")]
    Aborted,

    /// A new connection could not be established
    #[error("failed to open connection: {0}")]
    ConnectFailed(#[from] ConnectError),
}

/// Sizing for a resource pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePoolConfig {
    /// Connections opened by [`ResourcePool::initialize`]
    pub min_connections: usize,

    /// Upper bound on open connections
    pub max_connections: usize,
}

impl ResourcePoolConfig {
    /// Create a config; the floor is clamped to the maximum
    pub fn new(min_connections: usize, max_connections: usize) -> Self {
        Self {
            min_connections: min_connections.min(max_connections),
            max_connections,
        }
    }
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONNECTIONS, 10)
    }
}

impl From<&PoolSettings> for ResourcePoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self::new(settings.floor(), settings.max_connections)
    }
}

struct PoolState<B: Backend> {
    /// Idle connections, reused oldest first
    idle: VecDeque<Connection<B>>,

    /// Idle plus on loan plus slots reserved for a connect in progress
    total: usize,

    /// Connections currently handed out
    on_loan: HashSet<ConnectionId>,

    aborted: bool,
}

/// A bounded pool of connections to one endpoint
pub struct ResourcePool<B: Backend> {
    name: String,
    endpoint: Arc<Endpoint>,
    config: ResourcePoolConfig,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    state: Mutex<PoolState<B>>,
    available: Condvar,
    anomalies: AtomicUsize,
}

impl<B: Backend> ResourcePool<B> {
    /// Create an empty pool. No connection is opened until
    /// [`initialize`](Self::initialize) or the first acquire.
    pub fn new(
        name: impl Into<String>,
        endpoint: Endpoint,
        config: ResourcePoolConfig,
        backend: Arc<B>,
    ) -> Arc<Self> {
        Self::with_clock(name, endpoint, config, backend, Arc::new(SystemClock))
    }

    /// Create an empty pool whose connections read time from `clock`
    pub fn with_clock(
        name: impl Into<String>,
        endpoint: Endpoint,
        config: ResourcePoolConfig,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let config = ResourcePoolConfig::new(config.min_connections, config.max_connections);
        Arc::new(Self {
            name: name.into(),
            endpoint: Arc::new(endpoint),
            config,
            backend,
            clock,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.max_connections),
                total: 0,
                on_loan: HashSet::new(),
                aborted: false,
            }),
            available: Condvar::new(),
            anomalies: AtomicUsize::new(0),
        })
    }

    /// Open connections until the pool holds its floor.
    ///
    /// On failure every connection opened by this call is closed again.
    /// A teardown that lands while the floor is being opened fails the
    /// call with [`ResourcePoolError::Aborted`].
    pub fn initialize(&self) -> Result<(), ResourcePoolError> {
        info!(
            "Initializing pool `{}` for {} with {} of {} connections",
            self.name, self.endpoint, self.config.min_connections, self.config.max_connections
        );

        let mut opened: Vec<Connection<B>> = Vec::new();
        let mut state = self.state.lock();
        while state.total < self.config.min_connections {
            if state.aborted {
                state.total -= opened.len();
                return Err(ResourcePoolError::Aborted);
            }
            state.total += 1;
            match MutexGuard::unlocked(&mut state, || self.open_connection()) {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    state.total -= opened.len() + 1;
                    drop(state);
                    self.available.notify_all();
                    error!("Pool `{}` failed to initialize: {}", self.name, e);
                    return Err(e.into());
                }
            }
        }

        if state.aborted {
            state.total -= opened.len();
            drop(state);
            debug!(
                "Pool `{}` was torn down during initialization, closing {} connections",
                self.name,
                opened.len()
            );
            return Err(ResourcePoolError::Aborted);
        }

        state.idle.extend(opened);
        debug!(
            "Pool `{}` initialized with {} idle connections",
            self.name,
            state.idle.len()
        );
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Take a connection, waiting for one if the pool is full.
    ///
    /// A `timeout_ms` of zero or less waits until a connection is released
    /// or the pool is torn down.
    pub fn acquire(&self, timeout_ms: i64) -> Result<Connection<B>, ResourcePoolError> {
        let deadline = if timeout_ms > 0 {
            Some(Instant::now() + Duration::from_millis(timeout_ms as u64))
        } else {
            None
        };

        let mut state = self.state.lock();
        loop {
            if let Some(result) = self.take_or_grow(&mut state) {
                return result;
            }

            trace!("Pool `{}` is full, waiting for a release", self.name);
            match deadline {
                None => self.available.wait(&mut state),
                Some(deadline) => {
                    let timed_out = self.available.wait_until(&mut state, deadline).timed_out();
                    if timed_out
                        && !state.aborted
                        && state.idle.is_empty()
                        && state.total >= self.config.max_connections
                    {
                        debug!(
                            "Pool `{}`: acquire timed out after {}ms",
                            self.name, timeout_ms
                        );
                        return Err(ResourcePoolError::Timeout(timeout_ms as u64));
                    }
                }
            }
        }
    }

    /// Take a connection without waiting
    pub fn try_acquire(&self) -> Result<Connection<B>, ResourcePoolError> {
        let mut state = self.state.lock();
        self.take_or_grow(&mut state)
            .unwrap_or(Err(ResourcePoolError::Exhausted))
    }

    /// One acquisition attempt; `None` means the caller has to wait.
    fn take_or_grow(
        &self,
        state: &mut MutexGuard<'_, PoolState<B>>,
    ) -> Option<Result<Connection<B>, ResourcePoolError>> {
        if state.aborted {
            return Some(Err(ResourcePoolError::Aborted));
        }

        if let Some(conn) = state.idle.pop_front() {
            state.on_loan.insert(conn.id());
            trace!("Pool `{}`: reusing connection {}", self.name, conn.id().short());
            return Some(Ok(conn));
        }

        if state.total >= self.config.max_connections {
            return None;
        }

        state.total += 1;
        let opened = MutexGuard::unlocked(state, || self.open_connection());
        Some(match opened {
            Ok(conn) if state.aborted => {
                state.total -= 1;
                MutexGuard::unlocked(state, || drop(conn));
                Err(ResourcePoolError::Aborted)
            }
            Ok(conn) => {
                state.on_loan.insert(conn.id());
                debug!(
                    "Pool `{}` grew to {} connections",
                    self.name, state.total
                );
                Ok(conn)
            }
            Err(e) => {
                state.total -= 1;
                self.available.notify_one();
                warn!("Pool `{}`: {}", self.name, e);
                Err(e.into())
            }
        })
    }

    fn open_connection(&self) -> Result<Connection<B>, ConnectError> {
        let mut conn = Connection::new(
            self.name.clone(),
            Arc::clone(&self.endpoint),
            Arc::clone(&self.backend),
            Arc::clone(&self.clock),
        );
        conn.connect()?;
        Ok(conn)
    }

    /// Give a connection back.
    ///
    /// Connections that are turned away are closed once the pool lock is
    /// released. Disconnected connections are closed and their slot freed. A
    /// connection this pool did not hand out is an anomaly: it is logged
    /// and counted, then adopted if it targets this pool and there is
    /// room, and closed otherwise.
    pub fn release(&self, conn: Connection<B>) {
        let id = conn.id();
        let mut state = self.state.lock();

        if conn.pool_name() != self.name || *conn.endpoint() != *self.endpoint {
            self.record_anomaly(&format!(
                "connection {} belongs to `{}` at {}",
                id.short(),
                conn.pool_name(),
                conn.endpoint()
            ));
            return;
        }

        if state.idle.iter().any(|idle| idle.id() == id) {
            self.record_anomaly(&format!("connection {} is already idle", id.short()));
            return;
        }

        if !state.on_loan.remove(&id) {
            let adopt = !state.aborted && state.total < self.config.max_connections;
            self.record_anomaly(&format!(
                "connection {} was not on loan, {}",
                id.short(),
                if adopt { "adopting it" } else { "closing it" }
            ));
            if !adopt {
                return;
            }
            state.total += 1;
        }

        if state.aborted {
            state.total -= 1;
            debug!(
                "Pool `{}` is torn down, closing connection {}",
                self.name,
                id.short()
            );
            return;
        }

        if !conn.is_connected() {
            state.total -= 1;
            drop(state);
            self.available.notify_one();
            debug!(
                "Pool `{}`: discarding disconnected connection {}",
                self.name,
                id.short()
            );
            return;
        }

        state.idle.push_back(conn);
        drop(state);
        self.available.notify_one();
        trace!("Pool `{}`: connection {} released", self.name, id.short());
    }

    fn record_anomaly(&self, detail: &str) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
        warn!("Pool `{}` release anomaly: {}", self.name, detail);
    }

    /// Fail every waiting and future acquire and close idle connections.
    ///
    /// Connections on loan stay open until they are released.
    pub fn teardown(&self) {
        let idle: Vec<Connection<B>> = {
            let mut state = self.state.lock();
            if state.aborted {
                return;
            }
            state.aborted = true;
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.total -= idle.len();
            idle
        };
        self.available.notify_all();

        info!(
            "Tearing down pool `{}`, closing {} idle connections",
            self.name,
            idle.len()
        );
        drop(idle);
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The endpoint every connection targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Idle connections
    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Open connections, idle and on loan
    pub fn total_count(&self) -> usize {
        self.state.lock().total
    }

    /// Connections currently handed out
    pub fn on_loan_count(&self) -> usize {
        self.state.lock().on_loan.len()
    }

    /// Maximum number of connections
    pub fn max_count(&self) -> usize {
        self.config.max_connections
    }

    /// Whether [`teardown`](Self::teardown) has run
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Releases that did not match a loan
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.load(Ordering::Relaxed)
    }
}

impl<B: Backend> Drop for ResourcePool<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
