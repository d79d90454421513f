//! # Strand Core
//!
//! `strand_core` provides the shared building blocks for the Strand
//! concurrency crates: configuration loading, error types, strongly-typed
//! identifiers and the clock used for deadlines.
//!
//! ## Crate Structure
//!
//! - **config**: Pool registry configuration, from TOML files or flat key-value sources
//! - **error**: Error types for configuration handling
//! - **id**: Strongly-typed identifier types
//! - **utils**: Clocks and other small helpers

pub mod config;
pub mod error;
pub mod id;
pub mod utils;

// Re-export key types for convenience
pub use config::{ConfigLookup, PoolSettings, RegistryConfig};
pub use error::{ConfigError, Result};
pub use id::ConnectionId;
pub use utils::clock::{Clock, ManualClock, SystemClock};
