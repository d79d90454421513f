//! Connections to an external key-value server.
//!
//! The wire protocol is not this crate's concern: a [`Backend`] opens,
//! drives and closes raw handles, and a [`Connection`] layers the
//! connection lifecycle on top of it (throttled connects, the
//! `AUTH`/`SELECT` handshake, and dropping back to
//! [`ConnectionState::Disconnected`] on transport failure).

use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use strand_core::config::PoolSettings;
use strand_core::id::ConnectionId;
use strand_core::utils::clock::Clock;
use thiserror::Error;

/// Timeout handed to [`Backend::connect`]
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// The server a connection talks to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Database (namespace) index selected after connecting
    pub db_index: u16,

    /// Credential for `AUTH`; empty disables authentication
    pub password: String,
}

impl Endpoint {
    /// Endpoint for database 0 with no password
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            db_index: 0,
            password: String::new(),
        }
    }

    /// Select a different database index
    pub fn with_db(mut self, db_index: u16) -> Self {
        self.db_index = db_index;
        self
    }

    /// Authenticate with `password`
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.db_index)
    }
}

impl From<&PoolSettings> for Endpoint {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            db_index: settings.db,
            password: settings.password.clone(),
        }
    }
}

/// A command as an ordered argument list, name first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    /// Start a command
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// The command name
    pub fn name(&self) -> &str {
        &self.args[0]
    }

    /// Every argument, name included
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log credentials.
        if self.name().eq_ignore_ascii_case("AUTH") {
            return write!(f, "AUTH ****");
        }
        write!(f, "{}", self.args.join(" "))
    }
}

/// A server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Simple status such as `OK`
    Status(String),
    /// Error reported by the server; the connection remains usable
    Error(String),
    /// Integer reply
    Integer(i64),
    /// Binary-safe string
    Bulk(Vec<u8>),
    /// Absent value
    Nil,
    /// Multiple replies
    Array(Vec<Reply>),
}

impl Reply {
    /// Whether this is the `OK` status
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::Status(status) if status.eq_ignore_ascii_case("OK"))
    }
}

/// Transport-level failure reported by a [`Backend`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The server could not be reached
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// The connection broke while a command was in flight
    #[error("I/O failure: {0}")]
    Io(String),

    /// The operation did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// The opaque collaborator that performs the actual network I/O
pub trait Backend: Send + Sync + 'static {
    /// A live connection
    type Handle: Send + 'static;

    /// Open a connection to `endpoint`
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Handle, BackendError>;

    /// Run one command and wait for its reply
    fn execute(&self, handle: &mut Self::Handle, command: &Command) -> Result<Reply, BackendError>;

    /// Release a connection
    fn close(&self, handle: Self::Handle);
}

/// Why a connection could not be established
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// The previous attempt was within the same second
    #[error("connect to {endpoint} throttled: last attempt was less than a second ago")]
    Throttled {
        /// Target endpoint
        endpoint: String,
    },

    /// The backend failed to connect or to run a handshake command
    #[error("failed to connect to {endpoint}: {source}")]
    Backend {
        /// Target endpoint
        endpoint: String,
        /// Backend failure
        #[source]
        source: BackendError,
    },

    /// The server rejected the credential
    #[error("authentication to {endpoint} rejected: {reason}")]
    AuthRejected {
        /// Target endpoint
        endpoint: String,
        /// Server message
        reason: String,
    },

    /// The server refused to select the database
    #[error("failed to select database on {endpoint}: {reason}")]
    SelectFailed {
        /// Target endpoint
        endpoint: String,
        /// Server message
        reason: String,
    },
}

/// Why a command produced no reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The connection was down and could not be re-established
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The transport failed; the connection is now disconnected
    #[error("command `{command}` failed: {source}")]
    Transport {
        /// The command, credentials redacted
        command: String,
        /// Backend failure
        #[source]
        source: BackendError,
    },
}

/// Lifecycle of a [`Connection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live handle
    Disconnected,
    /// A connect or handshake is in progress
    Connecting,
    /// A live handle is held
    Connected,
}

/// One connection to one endpoint, tagged with the pool it belongs to
pub struct Connection<B: Backend> {
    id: ConnectionId,
    pool_name: String,
    endpoint: Arc<Endpoint>,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    state: ConnectionState,
    handle: Option<B::Handle>,
    /// Epoch seconds of the last connect attempt
    last_connect_secs: Option<i64>,
}

impl<B: Backend> Connection<B> {
    /// Create a disconnected connection
    pub fn new(
        pool_name: impl Into<String>,
        endpoint: Arc<Endpoint>,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            pool_name: pool_name.into(),
            endpoint,
            backend,
            clock,
            state: ConnectionState::Disconnected,
            handle: None,
            last_connect_secs: None,
        }
    }

    /// Connect and run the handshake, unless already connected.
    ///
    /// At most one attempt is made per calling second; a second attempt
    /// within the same second fails with [`ConnectError::Throttled`].
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.open()?;
        self.handle = Some(handle);
        Ok(())
    }

    fn open(&mut self) -> Result<B::Handle, ConnectError> {
        let now = self.clock.now_secs();
        if let Some(last) = self.last_connect_secs {
            if now < last + 1 {
                debug!(
                    "Connection {}: connect to {} throttled",
                    self.id.short(),
                    self.endpoint
                );
                return Err(ConnectError::Throttled {
                    endpoint: self.endpoint.to_string(),
                });
            }
        }
        self.last_connect_secs = Some(now);
        self.state = ConnectionState::Connecting;

        let mut handle = match self.backend.connect(&self.endpoint, CONNECT_TIMEOUT) {
            Ok(handle) => handle,
            Err(source) => {
                error!(
                    "Connection {}: connect to {} failed: {}",
                    self.id.short(),
                    self.endpoint,
                    source
                );
                self.state = ConnectionState::Disconnected;
                return Err(ConnectError::Backend {
                    endpoint: self.endpoint.to_string(),
                    source,
                });
            }
        };

        if let Err(e) = self.handshake(&mut handle) {
            error!("Connection {}: {}", self.id.short(), e);
            self.backend.close(handle);
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }

        self.state = ConnectionState::Connected;
        debug!(
            "Connection {}: connected to {} for pool `{}`",
            self.id.short(),
            self.endpoint,
            self.pool_name
        );
        Ok(handle)
    }

    fn handshake(&self, handle: &mut B::Handle) -> Result<(), ConnectError> {
        let endpoint = self.endpoint.to_string();
        let backend_error = |source: BackendError| ConnectError::Backend {
            endpoint: endpoint.clone(),
            source,
        };

        if !self.endpoint.password.is_empty() {
            let auth = Command::new("AUTH").arg(&self.endpoint.password);
            match self.backend.execute(handle, &auth).map_err(backend_error)? {
                Reply::Error(reason) => {
                    return Err(ConnectError::AuthRejected {
                        endpoint: endpoint.clone(),
                        reason,
                    })
                }
                _ => info!("Connection {}: authenticated", self.id.short()),
            }
        }

        let select = Command::new("SELECT").arg(self.endpoint.db_index);
        let reply = self.backend.execute(handle, &select).map_err(backend_error)?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(ConnectError::SelectFailed {
                endpoint: endpoint.clone(),
                reason: format!("{:?}", reply),
            })
        }
    }

    /// Run a command, reconnecting first if disconnected.
    ///
    /// A transport failure closes the handle and leaves the connection
    /// [`ConnectionState::Disconnected`]; server error replies are
    /// returned as [`Reply::Error`].
    pub fn execute(&mut self, command: &Command) -> Result<Reply, CommandError> {
        let mut handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.open()?,
        };

        match self.backend.execute(&mut handle, command) {
            Ok(reply) => {
                self.handle = Some(handle);
                Ok(reply)
            }
            Err(source) => {
                warn!(
                    "Connection {}: `{}` failed, disconnecting: {}",
                    self.id.short(),
                    command,
                    source
                );
                self.backend.close(handle);
                self.state = ConnectionState::Disconnected;
                Err(CommandError::Transport {
                    command: command.to_string(),
                    source,
                })
            }
        }
    }

    /// Close the handle, if any
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.close(handle);
            debug!("Connection {}: disconnected", self.id.short());
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Unique id of this connection
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Name of the pool this connection is routed back to
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// The endpoint this connection targets
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a live handle is held
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Epoch seconds of the last connect attempt
    pub fn last_connect_secs(&self) -> Option<i64> {
        self.last_connect_secs
    }
}

impl<B: Backend> Drop for Connection<B> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<B: Backend> fmt::Debug for Connection<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("pool_name", &self.pool_name)
            .field("endpoint", &self.endpoint.to_string())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::memory::MemoryBackend;
    use strand_core::utils::clock::ManualClock;

    fn connection(
        backend: &Arc<MemoryBackend>,
        endpoint: Endpoint,
    ) -> (Connection<MemoryBackend>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let conn = Connection::new(
            "cache",
            Arc::new(endpoint),
            Arc::clone(backend),
            clock.clone(),
        );
        (conn, clock)
    }

    #[test]
    fn test_connect_selects_database() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut conn, _) = connection(&backend, Endpoint::new("localhost", 6379).with_db(3));

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        conn.connect().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(conn.is_connected());
        assert_eq!(backend.open_handles(), 1);

        let reply = conn.execute(&Command::new("PING")).unwrap();
        assert_eq!(reply, Reply::Status("PONG".to_string()));

        // connecting again is a no-op
        conn.connect().unwrap();
        assert_eq!(backend.connect_count(), 1);

        drop(conn);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_connect_failure_is_throttled_within_a_second() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_reachable(false);
        let (mut conn, clock) = connection(&backend, Endpoint::new("localhost", 6379));

        assert!(matches!(conn.connect(), Err(ConnectError::Backend { .. })));
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        backend.set_reachable(true);
        clock.advance(500);
        assert!(matches!(conn.connect(), Err(ConnectError::Throttled { .. })));
        assert_eq!(backend.connect_count(), 1);

        clock.advance(500);
        conn.connect().unwrap();
        assert_eq!(backend.connect_count(), 2);
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let backend = Arc::new(MemoryBackend::with_password("secret"));
        let (mut conn, _) = connection(
            &backend,
            Endpoint::new("localhost", 6379).with_password("guess"),
        );

        assert!(matches!(conn.connect(), Err(ConnectError::AuthRejected { .. })));
        assert!(!conn.is_connected());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_correct_password_is_accepted() {
        let backend = Arc::new(MemoryBackend::with_password("secret"));
        let (mut conn, _) = connection(
            &backend,
            Endpoint::new("localhost", 6379).with_password("secret"),
        );
        conn.connect().unwrap();
        assert!(conn.is_connected());
    }

    #[test]
    fn test_missing_password_fails_select() {
        let backend = Arc::new(MemoryBackend::with_password("secret"));
        let (mut conn, _) = connection(&backend, Endpoint::new("localhost", 6379));

        assert!(matches!(conn.connect(), Err(ConnectError::SelectFailed { .. })));
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_transport_failure_disconnects_and_reconnects_lazily() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut conn, clock) = connection(&backend, Endpoint::new("localhost", 6379));
        conn.connect().unwrap();

        backend.fail_next_commands(1);
        let err = conn.execute(&Command::new("GET").arg("k")).unwrap_err();
        assert!(matches!(err, CommandError::Transport { .. }));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(backend.open_handles(), 0);

        clock.advance(1_000);
        let reply = conn.execute(&Command::new("GET").arg("k")).unwrap();
        assert_eq!(reply, Reply::Nil);
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(backend.connect_count(), 2);
    }

    #[test]
    fn test_server_error_keeps_connection() {
        let backend = Arc::new(MemoryBackend::new());
        let (mut conn, _) = connection(&backend, Endpoint::new("localhost", 6379));

        let reply = conn.execute(&Command::new("NOPE")).unwrap();
        assert!(matches!(reply, Reply::Error(_)));
        assert!(conn.is_connected());
    }

    #[test]
    fn test_command_display_redacts_auth() {
        assert_eq!(Command::new("AUTH").arg("hunter2").to_string(), "AUTH ****");
        assert_eq!(Command::new("SET").arg("k").arg(1).to_string(), "SET k 1");
    }

    #[test]
    fn test_endpoint_from_settings() {
        let mut settings = PoolSettings::new("10.1.1.1", 6380, 4, 8);
        settings.password = "pw".to_string();
        let endpoint = Endpoint::from(&settings);
        assert_eq!(endpoint.address(), "10.1.1.1:6380");
        assert_eq!(endpoint.db_index, 4);
        assert_eq!(endpoint.password, "pw");
        assert_eq!(endpoint.to_string(), "10.1.1.1:6380/4");
    }
}
