//! Externally persisted session storage for sessionfarm.
//!
//! Session payloads are opaque bytes keyed by the route-agnostic session key.
//! This crate provides:
//! - [`BackendService`]: the persistence contract the session manager uses
//! - [`KeyValueBackend`]: one backing store, with the batched expiry scan
//! - [`ReplicatingBackend`]: fan-out over independent backend clusters
//! - [`BackendRegistry`]: maps a configured kind to its store factory
//!
//! Stores implement the lower-level [`KeyValueStore`] seam. [`RedisStore`] and
//! [`MemoryStore`] ship by default.

pub mod adapter;
pub mod address;
pub mod error;
pub mod expiry;
pub mod memory;
pub mod redis_store;
pub mod registry;
pub mod replicating;
pub mod service;
pub mod store;

pub use adapter::{BATCH_PAUSE, BATCH_SIZE, KeyValueBackend};
pub use address::{DEFAULT_PORT, Endpoint, LIST_SEPARATOR, split_address_list};
pub use error::{BoxError, Error, Result};
pub use expiry::{ExpiryThreshold, NEVER_EXPIRE_MILLIS};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use registry::{BackendRegistry, BackendSpec};
pub use replicating::ReplicatingBackend;
pub use service::BackendService;
pub use store::{ConnectOptions, KeyValueStore, StoreFactory};
