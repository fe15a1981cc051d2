//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [node]      # route label of this node
//! [backend]   # backing store kind, address(es) and expiry threshold
//! [cache]     # local session bookkeeping
//! [sweep]     # periodic expiry reconciliation
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default values shared by the config types and their consumers.
pub mod defaults {
    use std::time::Duration;

    pub const BACKEND_KIND: &str = "redis";
    pub const BACKEND_ADDRESS: &str = "127.0.0.1";
    /// Expiry threshold sentinel meaning "sessions never expire".
    pub const NEVER_EXPIRE: i64 = -1;
    pub const CONNECT_TIMEOUT_MS: u64 = 2_000;
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 3_000;
    pub const MAX_SESSIONS: usize = 10_000;
    pub const SWEEP_INTERVAL_SECS: u64 = 60;

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section has defaults, so an empty file is a valid (single node,
/// local redis, never-expiring) configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Node identity.
    pub node: NodeConfig,

    /// Backing store settings.
    pub backend: BackendConfig,

    /// Local session bookkeeping.
    pub cache: CacheConfig,

    /// Background expiry sweep.
    pub sweep: SweepConfig,
}

impl StoreConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Structural checks that do not need the backend.
    ///
    /// Address syntax and the expiry sentinel are checked by the backend at
    /// `init`, so a bad address is still reported as a backend configuration
    /// error and not here.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.max_sessions".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sweep.enabled && self.sweep.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sweep.interval_secs".to_string(),
                reason: "must be positive when the sweep is enabled".to_string(),
            });
        }
        if let Some(route) = &self.node.route
            && route.contains('.')
        {
            return Err(ConfigError::Invalid {
                field: "node.route".to_string(),
                reason: format!("route '{route}' must not contain '.'"),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[node]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Route label appended to session ids issued by this node.
    ///
    /// `None` disables sticky routing: every lookup refreshes from the backend.
    pub route: Option<String>,
}

impl NodeConfig {
    /// The configured route, treating an empty string as unset.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref().filter(|r| !r.is_empty())
    }
}

/// `[backend]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Registry key of the store implementation (`redis`, `memory`, ...).
    pub kind: String,

    /// Fan writes out to every address in a `;`-separated list.
    pub replicate: bool,

    /// `host[:port]`, or a `;`-separated list when `replicate` is set.
    pub address: String,

    /// Sessions untouched for longer than this are expired. `-1` never expires.
    pub expiry_threshold_ms: i64,

    /// Connect timeout for a single endpoint.
    pub connect_timeout_ms: u64,

    /// Upper bound on waiting for connections to close at shutdown.
    pub shutdown_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: defaults::BACKEND_KIND.to_string(),
            replicate: false,
            address: defaults::BACKEND_ADDRESS.to_string(),
            expiry_threshold_ms: defaults::NEVER_EXPIRE,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of sessions kept locally before LRU eviction.
    pub max_sessions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_sessions: defaults::MAX_SESSIONS,
        }
    }
}

/// `[sweep]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Whether the host should run the background expiry sweep.
    pub enabled: bool,

    /// Seconds between sweeps.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: defaults::SWEEP_INTERVAL_SECS,
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider trait
// ─────────────────────────────────────────────────────────────────────────────

/// Store configuration capability.
///
/// Lets components depend on the settings they read rather than on the full
/// [`StoreConfig`] structure.
pub trait HasStoreConfig: Clone + Send + Sync + 'static {
    /// Route label of this node, if sticky routing is enabled.
    fn route(&self) -> Option<&str>;

    /// Raw expiry threshold in milliseconds (`-1` = never).
    fn expiry_threshold_ms(&self) -> i64;

    /// Maximum number of locally cached sessions.
    fn max_sessions(&self) -> usize;

    /// Interval between background expiry sweeps.
    fn sweep_interval(&self) -> Duration {
        defaults::sweep_interval()
    }
}

impl HasStoreConfig for StoreConfig {
    fn route(&self) -> Option<&str> {
        self.node.route()
    }

    fn expiry_threshold_ms(&self) -> i64 {
        self.backend.expiry_threshold_ms
    }

    fn max_sessions(&self) -> usize {
        self.cache.max_sessions
    }

    fn sweep_interval(&self) -> Duration {
        self.sweep.interval()
    }
}
