//! [`BackendService`] over a single [`KeyValueStore`].
//!
//! Owns the lifecycle (configured → running → shut down) and the batched
//! expiry scan. Expiry never enumerates the whole index in one round-trip:
//! it pages through at most [`BATCH_SIZE`] keys at a time and pauses between
//! full pages.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::address::Endpoint;
use crate::error::{Error, Result};
use crate::expiry::ExpiryThreshold;
use crate::service::BackendService;
use crate::store::{ConnectOptions, KeyValueStore, StoreFactory};

/// Maximum number of keys requested per index scan.
pub const BATCH_SIZE: usize = 1000;

/// Pause between two full batches.
pub const BATCH_PAUSE: Duration = Duration::from_millis(500);

enum AdapterState {
    Configured {
        address: String,
        factory: StoreFactory,
    },
    Running {
        endpoint: Option<Endpoint>,
        store: Arc<dyn KeyValueStore>,
    },
    ShutDown,
}

/// Backend service for one instance of the backing key-value store.
pub struct KeyValueBackend {
    state: RwLock<AdapterState>,
    expiry: ExpiryThreshold,
    options: ConnectOptions,
    batch_size: usize,
    batch_pause: Duration,
}

impl KeyValueBackend {
    /// Create an adapter that connects to `address` on [`init`](BackendService::init).
    pub fn new(
        address: impl Into<String>,
        expiry: ExpiryThreshold,
        factory: StoreFactory,
        options: ConnectOptions,
    ) -> Self {
        Self {
            state: RwLock::new(AdapterState::Configured {
                address: address.into(),
                factory,
            }),
            expiry,
            options,
            batch_size: BATCH_SIZE,
            batch_pause: BATCH_PAUSE,
        }
    }

    /// Wrap an already constructed store. The adapter starts out running.
    pub fn with_store(store: Arc<dyn KeyValueStore>, expiry: ExpiryThreshold) -> Self {
        Self {
            state: RwLock::new(AdapterState::Running {
                endpoint: None,
                store,
            }),
            expiry,
            options: ConnectOptions::default(),
            batch_size: BATCH_SIZE,
            batch_pause: BATCH_PAUSE,
        }
    }

    /// Override the scan batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the pause between full batches.
    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    /// Override the expiry threshold.
    pub fn with_expiry_threshold(mut self, expiry: ExpiryThreshold) -> Self {
        self.expiry = expiry;
        self
    }

    fn store(&self) -> Result<Arc<dyn KeyValueStore>> {
        match &*self.state.read() {
            AdapterState::Running { store, .. } => Ok(Arc::clone(store)),
            AdapterState::Configured { .. } => Err(Error::ServiceUnavailable(
                "backend has not been initialised".to_string(),
            )),
            AdapterState::ShutDown => Err(Error::ServiceUnavailable(
                "backend has been shut down".to_string(),
            )),
        }
    }

    fn is_shut_down(&self) -> bool {
        matches!(&*self.state.read(), AdapterState::ShutDown)
    }

    fn pause_between_batches(&self) {
        if !self.batch_pause.is_zero() {
            debug!(
                pause_ms = u64::try_from(self.batch_pause.as_millis()).unwrap_or(u64::MAX),
                "Full batch, pausing before next scan"
            );
            std::thread::sleep(self.batch_pause);
        }
    }
}

impl BackendService for KeyValueBackend {
    fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        let (address, factory) = match &*state {
            AdapterState::Configured { address, factory } => (address.clone(), *factory),
            AdapterState::Running { .. } => return Ok(()),
            AdapterState::ShutDown => {
                return Err(Error::ServiceUnavailable(
                    "backend has been shut down".to_string(),
                ));
            }
        };

        let endpoint = Endpoint::parse(&address)?;
        let store = factory(&endpoint, &self.options)?;
        info!(endpoint = %endpoint, expiry = ?self.expiry, "Backend initialised");
        *state = AdapterState::Running {
            endpoint: Some(endpoint),
            store,
        };
        Ok(())
    }

    fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), AdapterState::ShutDown);
        if let AdapterState::Running { endpoint, store } = previous {
            store.close(self.options.shutdown_timeout);
            match endpoint {
                Some(endpoint) => info!(endpoint = %endpoint, "Backend shut down"),
                None => info!("Backend shut down"),
            }
        }
    }

    fn persist(&self, key: &str, payload: &[u8]) -> Result<()> {
        let store = self.store()?;
        let now = Utc::now().timestamp_millis();
        debug!(key = %key, bytes = payload.len(), "Persisting session");
        store.put(key, payload, now)
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store()?;
        debug!(key = %key, "Fetching session");
        store.get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let store = self.store()?;
        debug!(key = %key, "Deleting session");
        store.remove(key)
    }

    fn expired_keys(&self) -> Result<Vec<String>> {
        let store = self.store()?;
        let Some(cutoff) = self.expiry.cutoff_millis(Utc::now().timestamp_millis()) else {
            return Ok(Vec::new());
        };

        let mut keys = Vec::new();
        loop {
            let batch = match store.scan_index(cutoff, keys.len(), self.batch_size) {
                Ok(batch) => batch,
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    error!(error = %e, "Expiry scan failed, reporting no expired sessions");
                    return Ok(Vec::new());
                }
            };
            let full = batch.len() >= self.batch_size;
            keys.extend(batch);
            if !full {
                break;
            }
            self.pause_between_batches();
        }

        debug!(count = keys.len(), "Collected expired session keys");
        Ok(keys)
    }

    fn remove_expired(&self) -> Result<Vec<String>> {
        let store = self.store()?;
        let Some(cutoff) = self.expiry.cutoff_millis(Utc::now().timestamp_millis()) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        loop {
            if self.is_shut_down() {
                warn!(removed = removed.len(), "Shutdown during expiry sweep, stopping");
                break;
            }

            // Processed keys are deleted, so every scan starts at offset 0.
            let batch = match store.scan_index(cutoff, 0, self.batch_size) {
                Ok(batch) => batch,
                Err(e) => {
                    error!(error = %e, removed = removed.len(), "Expiry scan failed, ending sweep");
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }
            if batch.iter().all(|key| seen.contains(key)) {
                warn!(
                    count = batch.len(),
                    "Expiry scan keeps returning removed keys, ending sweep"
                );
                break;
            }

            let full = batch.len() >= self.batch_size;
            for key in batch {
                if let Err(e) = store.remove(&key) {
                    error!(key = %key, error = %e, "Failed to delete expired session, ending sweep");
                    return Ok(removed);
                }
                seen.insert(key.clone());
                removed.push(key);
            }

            if full {
                self.pause_between_batches();
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Removed expired sessions");
        }
        Ok(removed)
    }

    fn expiry_threshold(&self) -> ExpiryThreshold {
        self.expiry
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        match &*self.state.read() {
            AdapterState::Running {
                endpoint: Some(endpoint),
                ..
            } => vec![endpoint.clone()],
            _ => Vec::new(),
        }
    }
}
