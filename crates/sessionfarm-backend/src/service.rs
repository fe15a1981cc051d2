//! Backend service trait for pluggable session persistence.
//!
//! The session manager only talks to a [`BackendService`]. Implementations:
//! - [`KeyValueBackend`](crate::KeyValueBackend): one backing store instance
//! - [`ReplicatingBackend`](crate::ReplicatingBackend): fan-out over several
//!
//! # Example
//!
//! ```ignore
//! use sessionfarm_backend::{BackendRegistry, BackendService, BackendSpec};
//!
//! let backend = BackendRegistry::default().build(&spec)?;
//! backend.init()?;
//! backend.persist("abc", &payload)?;
//! let bytes = backend.fetch("abc")?;
//! ```

use crate::address::Endpoint;
use crate::error::Result;
use crate::expiry::ExpiryThreshold;

/// Trait for session persistence backends.
///
/// Keys are route-agnostic session keys; payloads are opaque bytes. Every
/// operation can be retried by the caller.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow sharing across threads.
pub trait BackendService: Send + Sync {
    /// Validate configuration and prepare connections.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the address is missing or malformed.
    fn init(&self) -> Result<()>;

    /// Close connections within a bounded wait. Always completes; afterwards
    /// every operation fails with `ServiceUnavailable`.
    fn shutdown(&self);

    /// Upsert the payload and refresh the key's last-accessed index entry.
    fn persist(&self, key: &str, payload: &[u8]) -> Result<()>;

    /// Fetch a payload. `Ok(None)` for a key never stored or already expired.
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove payload and index entry. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys whose last-accessed entry is older than the expiry threshold.
    ///
    /// Scans in bounded batches from the start of the index on every call.
    /// Scan failures are logged and reported as an empty result; only a
    /// terminal service state is returned as an error.
    fn expired_keys(&self) -> Result<Vec<String>>;

    /// Delete every expired key and return the keys actually removed.
    fn remove_expired(&self) -> Result<Vec<String>>;

    /// Idle threshold this service expires sessions by.
    fn expiry_threshold(&self) -> ExpiryThreshold;

    /// Endpoints this service talks to, for diagnostics.
    fn endpoints(&self) -> Vec<Endpoint> {
        Vec::new()
    }
}
