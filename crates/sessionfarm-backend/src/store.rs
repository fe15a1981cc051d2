//! Connection seam to one instance of the backing key-value store.
//!
//! A [`KeyValueStore`] knows how to move byte blobs and maintain the
//! last-accessed index. The expiry algorithm, lifecycle and error policy live
//! one level up in [`KeyValueBackend`](crate::KeyValueBackend), so every store
//! gets the same batching behavior.

use std::sync::Arc;
use std::time::Duration;

use sessionfarm_config::BackendConfig;

use crate::address::Endpoint;
use crate::error::Result;

/// Connection settings handed to store factories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Timeout for establishing a connection and for each round-trip.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a connection to close.
    pub shutdown_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(sessionfarm_config::defaults::CONNECT_TIMEOUT_MS),
            shutdown_timeout: Duration::from_millis(
                sessionfarm_config::defaults::SHUTDOWN_TIMEOUT_MS,
            ),
        }
    }
}

impl From<&BackendConfig> for ConnectOptions {
    fn from(config: &BackendConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Builds a store for one endpoint. Must not perform network I/O.
pub type StoreFactory = fn(&Endpoint, &ConnectOptions) -> Result<Arc<dyn KeyValueStore>>;

/// Trait for backing store connections.
///
/// # Thread Safety
///
/// A store is shared by every caller on a node, so implementations must be
/// `Send + Sync` and must not rely on callers holding it exclusively.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the payload stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Upsert the payload and move the key's index entry to `last_accessed_ms`.
    ///
    /// Any previous index entry for `key` must be removed before the new one
    /// is added, otherwise a stale low timestamp would expire a live session.
    fn put(&self, key: &str, value: &[u8], last_accessed_ms: i64) -> Result<()>;

    /// Remove the payload and the index entry. Removing an absent key is not
    /// an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Keys whose index value lies in `[0, below_ms)`, ascending by index
    /// value, skipping the first `offset` and returning at most `limit`.
    fn scan_index(&self, below_ms: i64, offset: usize, limit: usize) -> Result<Vec<String>>;

    /// Close the connection, waiting at most `timeout`.
    ///
    /// Never fails: problems are logged. Every call after `close` must fail
    /// with `ServiceUnavailable` without attempting I/O.
    fn close(&self, timeout: Duration);
}
