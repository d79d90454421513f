//! Pool registry configuration.
//!
//! A registry is described by a set of named pools, each pointing at one
//! key-value server. The description can come from a TOML file:
//!
//! ```toml
//! [pools.session]
//! host = "127.0.0.1"
//! port = 6379
//! db = 0
//! max_connections = 8
//! ```
//!
//! or from a flat key-value source (see [`RegistryConfig::from_lookup`]),
//! where `CacheInstances = session,token` declares the pools and
//! `session_host`, `session_port`, `session_db` and
//! `session_maxconncnt` describe each one.

use crate::error::{ConfigError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::hash::BuildHasher;
use std::path::Path;
use std::str::FromStr;

/// Key listing the pool names in a flat configuration source.
pub const INSTANCES_KEY: &str = "CacheInstances";

/// Connections opened eagerly when a pool does not configure a floor.
pub const DEFAULT_MIN_CONNECTIONS: usize = 2;

fn default_min_connections() -> usize {
    DEFAULT_MIN_CONNECTIONS
}

/// A flat `key -> value` configuration source.
pub trait ConfigLookup {
    /// Look up a single key.
    fn lookup(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher> ConfigLookup for HashMap<String, String, S> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigLookup for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Settings for one named pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Database (namespace) index selected after connecting
    pub db: u16,

    /// Upper bound on open connections
    pub max_connections: usize,

    /// Connections opened when the pool is initialized
    #[serde(default = "default_min_connections")]
    pub min_connections: usize,

    /// Credential sent with `AUTH`; empty means no authentication
    #[serde(default)]
    pub password: String,
}

impl PoolSettings {
    /// Create settings with the default floor and no password.
    pub fn new(host: impl Into<String>, port: u16, db: u16, max_connections: usize) -> Self {
        Self {
            host: host.into(),
            port,
            db,
            max_connections,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            password: String::new(),
        }
    }

    /// Number of connections to open eagerly, never above the maximum.
    pub fn floor(&self) -> usize {
        self.min_connections.min(self.max_connections)
    }

    fn validate(&self, pool: &str) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                pool: pool.to_string(),
                key: "host".to_string(),
                value: self.host.clone(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                pool: pool.to_string(),
                key: "max_connections".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// The complete registry description: pool name to settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Named pools
    #[serde(default)]
    pub pools: BTreeMap<String, PoolSettings>,
}

impl RegistryConfig {
    /// Add (or replace) a pool.
    pub fn with_pool(mut self, name: impl Into<String>, settings: PoolSettings) -> Self {
        self.pools.insert(name.into(), settings);
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading registry configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Build from a flat key-value source.
    ///
    /// `CacheInstances` holds a comma-separated list of pool names. For
    /// each name, `{name}_host`, `{name}_port`, `{name}_db` and
    /// `{name}_maxconncnt` are required; `{name}_password` and
    /// `{name}_minconncnt` are optional.
    pub fn from_lookup(lookup: &dyn ConfigLookup) -> Result<Self> {
        let instances = lookup
            .lookup(INSTANCES_KEY)
            .ok_or_else(|| ConfigError::NoPools(INSTANCES_KEY.to_string()))?;

        let mut config = Self::default();
        for name in instances.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let settings = PoolSettings {
                host: required(lookup, name, "host")?,
                port: parse(name, "port", required(lookup, name, "port")?)?,
                db: parse(name, "db", required(lookup, name, "db")?)?,
                max_connections: parse(name, "maxconncnt", required(lookup, name, "maxconncnt")?)?,
                min_connections: match optional(lookup, name, "minconncnt") {
                    Some(value) => parse(name, "minconncnt", value)?,
                    None => DEFAULT_MIN_CONNECTIONS,
                },
                password: optional(lookup, name, "password").unwrap_or_default(),
            };
            debug!(
                "Configured pool `{}` -> {}:{}/{} (max {})",
                name, settings.host, settings.port, settings.db, settings.max_connections
            );
            config.pools.insert(name.to_string(), settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every pool and require at least one.
    pub fn validate(&self) -> Result<()> {
        if self.pools.is_empty() {
            return Err(ConfigError::NoPools(INSTANCES_KEY.to_string()));
        }
        for (name, settings) in &self.pools {
            settings.validate(name)?;
        }
        Ok(())
    }
}

fn key_for(pool: &str, suffix: &str) -> String {
    format!("{}_{}", pool, suffix)
}

fn optional(lookup: &dyn ConfigLookup, pool: &str, suffix: &str) -> Option<String> {
    lookup.lookup(&key_for(pool, suffix))
}

fn required(lookup: &dyn ConfigLookup, pool: &str, suffix: &str) -> Result<String> {
    optional(lookup, pool, suffix).ok_or_else(|| ConfigError::MissingKey {
        pool: pool.to_string(),
        key: key_for(pool, suffix),
    })
}

fn parse<T: FromStr>(pool: &str, suffix: &str, value: String) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        pool: pool.to_string(),
        key: key_for(pool, suffix),
        value,
    })
}
