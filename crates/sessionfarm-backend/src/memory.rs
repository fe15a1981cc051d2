//! In-process key-value store.
//!
//! Keeps payloads in a map and the last-accessed index in an ordered set, so
//! it behaves like the networked store for expiry scans. Useful for single
//! node deployments, local development and tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::address::Endpoint;
use crate::error::{Error, Result};
use crate::store::{ConnectOptions, KeyValueStore};

#[derive(Debug, Default)]
struct MemoryInner {
    /// key -> (payload, last accessed millis)
    values: HashMap<String, (Vec<u8>, i64)>,
    /// (last accessed millis, key), ordered for range scans
    index: BTreeSet<(i64, String)>,
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry factory. The endpoint is only used for logging.
    pub fn connect(endpoint: &Endpoint, _options: &ConnectOptions) -> Result<Arc<dyn KeyValueStore>> {
        debug!(endpoint = %endpoint, "Creating in-memory session store");
        Ok(Arc::new(Self::new()))
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().values.is_empty()
    }

    /// Index value currently recorded for `key`.
    pub fn last_accessed_ms(&self, key: &str) -> Option<i64> {
        self.inner.lock().values.get(key).map(|(_, ts)| *ts)
    }

    /// Number of index entries (one per stored key when consistent).
    pub fn index_len(&self) -> usize {
        self.inner.lock().index.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::ServiceUnavailable("memory store is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.inner.lock().values.get(key).map(|(bytes, _)| bytes.clone()))
    }

    fn put(&self, key: &str, value: &[u8], last_accessed_ms: i64) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        if let Some((_, previous)) = inner.values.get(key) {
            let stale = (*previous, key.to_string());
            inner.index.remove(&stale);
        }
        inner
            .values
            .insert(key.to_string(), (value.to_vec(), last_accessed_ms));
        inner.index.insert((last_accessed_ms, key.to_string()));
        trace!(key = %key, last_accessed_ms, "Stored session payload");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock();
        if let Some((_, ts)) = inner.values.remove(key) {
            inner.index.remove(&(ts, key.to_string()));
        }
        Ok(())
    }

    fn scan_index(&self, below_ms: i64, offset: usize, limit: usize) -> Result<Vec<String>> {
        self.ensure_open()?;
        if below_ms <= 0 {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock();
        Ok(inner
            .index
            .range((0, String::new())..(below_ms, String::new()))
            .skip(offset)
            .take(limit)
            .map(|(_, key)| key.clone())
            .collect())
    }

    fn close(&self, _timeout: Duration) {
        self.closed.store(true, Ordering::Release);
        debug!("In-memory session store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = MemoryStore::new();
        store.put("a", b"payload", 10).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(store.last_accessed_ms("a"), Some(10));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.index_len(), 0);
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let store = MemoryStore::new();
        store.remove("missing").unwrap();
    }

    #[test]
    fn test_overwrite_replaces_index_entry() {
        let store = MemoryStore::new();
        store.put("a", b"v1", 100).unwrap();
        store.put("a", b"v2", 5_000).unwrap();

        // The old entry at 100 must be gone, otherwise "a" would look expired.
        assert_eq!(store.index_len(), 1);
        assert!(store.scan_index(1_000, 0, 10).unwrap().is_empty());
        assert_eq!(store.scan_index(6_000, 0, 10).unwrap(), vec!["a"]);
        assert_eq!(store.get("a").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        store.put("late", b"", 30).unwrap();
        store.put("early", b"", 10).unwrap();
        store.put("middle", b"", 20).unwrap();
        store.put("fresh", b"", 100).unwrap();

        assert_eq!(store.scan_index(50, 0, 10).unwrap(), vec!["early", "middle", "late"]);
        assert_eq!(store.scan_index(50, 0, 2).unwrap(), vec!["early", "middle"]);
        assert_eq!(store.scan_index(50, 2, 2).unwrap(), vec!["late"]);
        // Upper bound is exclusive.
        assert_eq!(store.scan_index(20, 0, 10).unwrap(), vec!["early"]);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = MemoryStore::new();
        store.put("a", b"", 1).unwrap();
        store.close(Duration::from_millis(10));

        assert!(matches!(store.get("a"), Err(Error::ServiceUnavailable(_))));
        assert!(matches!(store.put("a", b"", 2), Err(Error::ServiceUnavailable(_))));
        assert!(matches!(store.remove("a"), Err(Error::ServiceUnavailable(_))));
        assert!(matches!(store.scan_index(10, 0, 1), Err(Error::ServiceUnavailable(_))));
    }
}
