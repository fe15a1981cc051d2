//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use sessionfarm_backend::{
    BackendService, Endpoint, ExpiryThreshold, KeyValueBackend, MemoryStore, Result,
};
use sessionfarm_config::StoreConfig;
use sessionfarm_session::{JsonCodec, SessionStoreManager};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Persist { key: String, payload: Vec<u8> },
    Fetch { key: String },
    Delete { key: String },
    RemoveExpired,
}

/// Backend that records every call and forwards to a real adapter.
pub struct RecordingBackend {
    inner: KeyValueBackend,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBackend {
    /// Shared in-memory cluster store with the given expiry threshold.
    pub fn new(store: Arc<MemoryStore>, expiry: ExpiryThreshold) -> Self {
        Self {
            inner: KeyValueBackend::with_store(store, expiry)
                .with_batch_pause(std::time::Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn persists_of(&self, key: &str) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Persist { key: k, payload } if k == key => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl BackendService for RecordingBackend {
    fn init(&self) -> Result<()> {
        self.inner.init()
    }

    fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn persist(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.record(Call::Persist {
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        self.inner.persist(key, payload)
    }

    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.record(Call::Fetch {
            key: key.to_string(),
        });
        self.inner.fetch(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.record(Call::Delete {
            key: key.to_string(),
        });
        self.inner.delete(key)
    }

    fn expired_keys(&self) -> Result<Vec<String>> {
        self.inner.expired_keys()
    }

    fn remove_expired(&self) -> Result<Vec<String>> {
        self.record(Call::RemoveExpired);
        self.inner.remove_expired()
    }

    fn expiry_threshold(&self) -> ExpiryThreshold {
        self.inner.expiry_threshold()
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.inner.endpoints()
    }
}

/// A node of the farm: its manager and the recording backend it talks to.
pub struct Node {
    pub manager: Arc<SessionStoreManager>,
    pub backend: Arc<RecordingBackend>,
}

/// Build a node with `route` on top of the shared `store`.
pub fn node(route: Option<&str>, store: &Arc<MemoryStore>, expiry_ms: i64) -> Node {
    let expiry = ExpiryThreshold::from_millis(expiry_ms).expect("valid threshold");
    let backend = Arc::new(RecordingBackend::new(store.clone(), expiry));

    let mut config = StoreConfig::default();
    config.node.route = route.map(str::to_string);
    config.backend.kind = "memory".to_string();
    config.backend.expiry_threshold_ms = expiry_ms;

    let manager = SessionStoreManager::new(config, Arc::new(JsonCodec)).with_backend(backend.clone());
    Node {
        manager: Arc::new(manager),
        backend,
    }
}
