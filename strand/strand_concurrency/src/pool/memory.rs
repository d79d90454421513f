//! In-process backend.
//!
//! [`MemoryBackend`] answers a handful of commands (`AUTH`, `SELECT`,
//! `PING`, `ECHO`, `GET`, `SET`, `DEL`) from a shared map, and can be told
//! to refuse connections or break the next commands. It lets pools and
//! registries run without a server. Only built for tests, or with the
//! `testing` feature.

use crate::pool::connection::{Backend, BackendError, Command, Endpoint, Reply};
use log::trace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// A live in-process connection
#[derive(Debug)]
pub struct MemoryHandle {
    id: u64,
    db: u16,
    authenticated: bool,
}

impl MemoryHandle {
    /// Handle number, unique per backend
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Currently selected database
    pub fn db(&self) -> u16 {
        self.db
    }
}

/// A key-value store living in process memory
#[derive(Debug)]
pub struct MemoryBackend {
    password: Option<String>,
    reachable: AtomicBool,
    failing_commands: AtomicUsize,
    latency_ms: AtomicU64,
    next_handle: AtomicU64,
    connects: AtomicUsize,
    open: AtomicUsize,
    data: Mutex<HashMap<(u16, String), Vec<u8>>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// A reachable backend with no password
    pub fn new() -> Self {
        Self {
            password: None,
            reachable: AtomicBool::new(true),
            failing_commands: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            connects: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            data: Mutex::new(HashMap::new()),
        }
    }

    /// A backend that requires `AUTH password`
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Self::new()
        }
    }

    /// Refuse (or accept again) new connections
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make the next `count` commands fail at the transport level
    pub fn fail_next_commands(&self, count: usize) {
        self.failing_commands.store(count, Ordering::SeqCst);
    }

    /// Sleep this long inside every connect and every command
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Connect attempts seen so far, failed ones included
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Handles opened and not yet closed
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn simulate_latency(&self) {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_millis(latency));
        }
    }

    fn take_failure(&self) -> bool {
        self.failing_commands
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn dispatch(&self, handle: &mut MemoryHandle, args: &[String]) -> Reply {
        let name = args[0].to_ascii_uppercase();

        if name == "AUTH" {
            return match (&self.password, args.get(1)) {
                (None, _) => Reply::Error("ERR AUTH called without any password configured".into()),
                (Some(_), None) => wrong_arity(&name),
                (Some(expected), Some(given)) if expected == given => {
                    handle.authenticated = true;
                    Reply::Status("OK".into())
                }
                (Some(_), Some(_)) => Reply::Error("WRONGPASS invalid password".into()),
            };
        }
        if self.password.is_some() && !handle.authenticated {
            return Reply::Error("NOAUTH Authentication required.".into());
        }

        match (name.as_str(), &args[1..]) {
            ("PING", []) => Reply::Status("PONG".into()),
            ("PING", [message]) | ("ECHO", [message]) => Reply::Bulk(message.clone().into_bytes()),
            ("SELECT", [index]) => match index.parse() {
                Ok(db) => {
                    handle.db = db;
                    Reply::Status("OK".into())
                }
                Err(_) => Reply::Error("ERR invalid DB index".into()),
            },
            ("GET", [key]) => match self.data.lock().get(&(handle.db, key.clone())) {
                Some(value) => Reply::Bulk(value.clone()),
                None => Reply::Nil,
            },
            ("SET", [key, value]) => {
                self.data
                    .lock()
                    .insert((handle.db, key.clone()), value.clone().into_bytes());
                Reply::Status("OK".into())
            }
            ("DEL", keys) if !keys.is_empty() => {
                let mut data = self.data.lock();
                let removed = keys
                    .iter()
                    .filter(|key| data.remove(&(handle.db, (*key).clone())).is_some())
                    .count();
                Reply::Integer(removed as i64)
            }
            ("PING", _) | ("ECHO", _) | ("SELECT", _) | ("GET", _) | ("SET", _) | ("DEL", _) => {
                wrong_arity(&name)
            }
            _ => Reply::Error(format!("ERR unknown command '{}'", args[0])),
        }
    }
}

fn wrong_arity(name: &str) -> Reply {
    Reply::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

impl Backend for MemoryBackend {
    type Handle = MemoryHandle;

    fn connect(&self, endpoint: &Endpoint, _timeout: Duration) -> Result<MemoryHandle, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable(endpoint.address()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        trace!("MemoryBackend: opened handle {} for {}", id, endpoint);
        Ok(MemoryHandle {
            id,
            db: 0,
            authenticated: false,
        })
    }

    fn execute(&self, handle: &mut MemoryHandle, command: &Command) -> Result<Reply, BackendError> {
        self.simulate_latency();
        if self.take_failure() {
            return Err(BackendError::Io("connection reset by peer".into()));
        }
        Ok(self.dispatch(handle, command.args()))
    }

    fn close(&self, handle: MemoryHandle) {
        trace!("MemoryBackend: closed handle {}", handle.id);
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
