//! Error types for configuration handling.
//!
//! Runtime errors (executor, pool, registry) live next to the code that
//! raises them in `strand_concurrency`; the variants here are the ones
//! that make a registry impossible to build at all.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a registry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No pool instances were declared
    #[error("no pools configured (`{0}` is missing or empty)")]
    NoPools(String),

    /// A declared pool is missing a required key
    #[error("pool `{pool}` is missing required key `{key}`")]
    MissingKey {
        /// The pool being configured
        pool: String,
        /// The missing key
        key: String,
    },

    /// A key is present but its value cannot be used
    #[error("pool `{pool}` has invalid value `{value}` for `{key}`")]
    InvalidValue {
        /// The pool being configured
        pool: String,
        /// The offending key
        key: String,
        /// The raw value
        value: String,
    },

    /// The configuration file could not be read
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for a registry
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
