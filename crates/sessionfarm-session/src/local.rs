//! Node-local session bookkeeping with LRU eviction.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::session::SessionRef;

/// Bounded map of composite id to session.
///
/// When full, inserting a new id evicts the least recently used session and
/// hands it back to the caller, who persists it if it is dirty.
pub struct LocalSessions {
    lru: Mutex<LruCache<String, SessionRef>>,
}

impl LocalSessions {
    pub fn new(max_sessions: usize) -> Self {
        let cap = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            lru: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lru.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.lru.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.lock().is_empty()
    }

    /// Look up and mark as recently used.
    pub fn get(&self, id: &str) -> Option<SessionRef> {
        self.lru.lock().get(id).cloned()
    }

    /// Look up without touching the LRU order.
    pub fn peek(&self, id: &str) -> Option<SessionRef> {
        self.lru.lock().peek(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lru.lock().contains(id)
    }

    /// Insert or replace. Returns the evicted `(id, session)`, if any.
    pub fn insert(&self, id: String, session: SessionRef) -> Option<(String, SessionRef)> {
        let mut lru = self.lru.lock();
        let pushed = lru.push(id.clone(), session);
        let len = lru.len();
        drop(lru);

        match pushed {
            // Same id: a replacement, not an eviction.
            Some((old_id, _)) if old_id == id => {
                trace!(session_id = %id, "Replaced local session");
                None
            }
            Some((evicted_id, evicted)) => {
                debug!(session_id = %evicted_id, "Evicting least recently used session");
                Some((evicted_id, evicted))
            }
            None => {
                trace!(session_id = %id, local_sessions = len, "Registered local session");
                None
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<SessionRef> {
        self.lru.lock().pop(id)
    }

    /// Snapshot of all held sessions, most recently used first.
    pub fn sessions(&self) -> Vec<(String, SessionRef)> {
        self.lru
            .lock()
            .iter()
            .map(|(id, session)| (id.clone(), session.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionId;
    use crate::session::Session;

    fn session(key: &str) -> SessionRef {
        Session::new(SessionId::new(key, Some("host1"))).into_ref()
    }

    #[test]
    fn test_insert_and_get() {
        let local = LocalSessions::new(10);
        assert!(local.insert("a.host1".to_string(), session("a")).is_none());

        assert!(local.contains("a.host1"));
        assert_eq!(local.get("a.host1").unwrap().lock().key(), "a");
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_replacement_is_not_eviction() {
        let local = LocalSessions::new(1);
        local.insert("a".to_string(), session("a"));
        assert!(local.insert("a".to_string(), session("a")).is_none());
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let local = LocalSessions::new(2);
        local.insert("a".to_string(), session("a"));
        local.insert("b".to_string(), session("b"));

        // Touch "a" so "b" becomes least recently used.
        local.get("a");

        let (evicted_id, evicted) = local.insert("c".to_string(), session("c")).unwrap();
        assert_eq!(evicted_id, "b");
        assert_eq!(evicted.lock().key(), "b");
        assert!(local.contains("a"));
        assert!(local.contains("c"));
    }

    #[test]
    fn test_peek_does_not_promote() {
        let local = LocalSessions::new(2);
        local.insert("a".to_string(), session("a"));
        local.insert("b".to_string(), session("b"));
        local.peek("a");

        let (evicted_id, _) = local.insert("c".to_string(), session("c")).unwrap();
        assert_eq!(evicted_id, "a");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let local = LocalSessions::new(0);
        assert_eq!(local.capacity(), 1);
    }

    #[test]
    fn test_remove() {
        let local = LocalSessions::new(4);
        local.insert("a".to_string(), session("a"));
        assert!(local.remove("a").is_some());
        assert!(local.remove("a").is_none());
        assert!(local.is_empty());
    }
}
