#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Strand Concurrency
//!
//! Bounded concurrency primitives for running work against scarce
//! network resources.
//!
//! This crate provides:
//!
//! - A fixed-size task executor with per-task expiry, result futures and
//!   bounded-time draining
//! - A lazily-grown, bounded connection pool with timeout-based
//!   acquisition and irreversible teardown
//! - A registry mapping logical pool names to pools, built once from
//!   configuration and shared by every caller
//!
//! The executor and the pools compose (a task body may borrow a
//! connection from the registry) but never call into each other.

/// Task execution and connection pooling
pub mod pool;

// Re-export key types for easier access
pub use pool::registry::{PoolRegistry, PooledConnection};
pub use pool::resource::ResourcePool;
pub use pool::thread::{TaskExecutor, TaskFuture};
