//! Task execution and connection pooling.
//!
//! - Thread pools for running deferred work on a fixed set of workers
//! - Connections to an external key-value server, and the backend trait
//!   that performs the actual I/O
//! - Resource pools that hand those connections out one caller at a time
//! - A registry of named pools

pub mod connection;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod registry;
pub mod resource;
pub mod thread;

// Re-export key types from connection
pub use connection::{
    Backend, BackendError, Command, CommandError, ConnectError, Connection, ConnectionState,
    Endpoint, Reply,
};

// Re-export key types from memory
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryBackend;

// Re-export key types from registry
pub use registry::{PoolRegistry, PooledConnection, RegistryCell, RegistryError};

// Re-export key types from resource
pub use resource::{ResourcePool, ResourcePoolConfig, ResourcePoolError};

// Re-export key types from thread
pub use thread::{ExecutorConfig, ExecutorError, ExecutorStats, TaskError, TaskExecutor, TaskFuture};
