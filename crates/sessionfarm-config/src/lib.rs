//! Configuration for the sessionfarm clustered session store.
//!
//! Provides TOML-based configuration with:
//! - the node's route label (`[node]`)
//! - backing store kind, address list and expiry threshold (`[backend]`)
//! - local cache bounds (`[cache]`) and the expiry sweep (`[sweep]`)
//!
//! Parsing only checks structure. Address syntax and the expiry sentinel are
//! validated by the backend when it is initialised.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{CONFIG_ENV, DEFAULT_CONFIG_FILE, LoadedConfig, load_config, load_config_file};
pub use error::{ConfigError, Result};
pub use types::{
    BackendConfig, CacheConfig, HasStoreConfig, NodeConfig, StoreConfig, SweepConfig, defaults,
};
