//! Backend kind registry.
//!
//! Maps a configured backend kind (`"redis"`, `"memory"`, ...) to the factory
//! that builds its stores, and assembles the [`BackendService`] the session
//! manager talks to.

use std::collections::HashMap;
use std::sync::Arc;

use sessionfarm_config::BackendConfig;
use tracing::debug;

use crate::adapter::KeyValueBackend;
use crate::error::{Error, Result};
use crate::expiry::ExpiryThreshold;
use crate::memory::MemoryStore;
use crate::redis_store::RedisStore;
use crate::replicating::ReplicatingBackend;
use crate::service::BackendService;
use crate::store::{ConnectOptions, StoreFactory};

/// Everything needed to build a backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub kind: String,
    pub replicate: bool,
    pub address: String,
    pub expiry: ExpiryThreshold,
    pub options: ConnectOptions,
}

impl BackendSpec {
    /// Validate and convert the `[backend]` config section.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let kind = config.kind.trim();
        if kind.is_empty() {
            return Err(Error::Configuration("backend kind is empty".to_string()));
        }
        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            replicate: config.replicate,
            address: config.address.clone(),
            expiry: ExpiryThreshold::from_millis(config.expiry_threshold_ms)?,
            options: ConnectOptions::from(config),
        })
    }
}

/// Registry of store factories by backend kind.
pub struct BackendRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl Default for BackendRegistry {
    /// Registry with the built-in `redis` and `memory` kinds.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("redis", RedisStore::connect);
        registry.register("memory", MemoryStore::connect);
        registry
    }
}

impl BackendRegistry {
    /// Registry with no kinds registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: StoreFactory) {
        let kind = kind.into().to_ascii_lowercase();
        debug!(kind = %kind, "Registered backend kind");
        self.factories.insert(kind, factory);
    }

    pub fn resolve(&self, kind: &str) -> Result<StoreFactory> {
        self.factories
            .get(&kind.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "unknown backend kind '{kind}' (known: {})",
                    self.kinds().join(", ")
                ))
            })
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build an uninitialised backend service for `spec`.
    ///
    /// The caller still has to call [`BackendService::init`].
    pub fn build(&self, spec: &BackendSpec) -> Result<Arc<dyn BackendService>> {
        let factory = self.resolve(&spec.kind)?;
        let service: Arc<dyn BackendService> = if spec.replicate {
            Arc::new(ReplicatingBackend::new(
                spec.address.clone(),
                spec.expiry,
                factory,
                spec.options,
            ))
        } else {
            Arc::new(KeyValueBackend::new(
                spec.address.clone(),
                spec.expiry,
                factory,
                spec.options,
            ))
        };
        Ok(service)
    }

    /// Convenience for `build(&BackendSpec::from_config(config)?)`.
    pub fn build_from_config(&self, config: &BackendConfig) -> Result<Arc<dyn BackendService>> {
        self.build(&BackendSpec::from_config(config)?)
    }
}
