//! The locally held session record.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::SessionId;

/// Shared handle to a session. The mutex guards the dirty flag transitions.
pub type SessionRef = Arc<Mutex<Session>>;

/// A session as held on this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,

    /// Application attributes, opaque to the store.
    pub attributes: BTreeMap<String, Value>,

    pub created_at: DateTime<Utc>,

    pub last_accessed: DateTime<Utc>,

    /// Created by this request and not yet seen by the client.
    #[serde(skip)]
    is_new: bool,

    #[serde(skip)]
    valid: bool,

    /// Unpersisted local changes. Never stored.
    #[serde(skip)]
    dirty: bool,

    /// When this node last wrote the session to the backend.
    #[serde(skip)]
    persisted_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A brand-new, valid session. It is dirty until first persisted.
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            attributes: BTreeMap::new(),
            created_at: now,
            last_accessed: now,
            is_new: true,
            valid: true,
            dirty: true,
            persisted_at: None,
        }
    }

    /// Empty, not yet valid record for a codec to populate.
    pub fn shell(id: SessionId) -> Self {
        Self {
            is_new: false,
            valid: false,
            dirty: false,
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Route-agnostic backend key.
    pub fn key(&self) -> &str {
        self.id.key()
    }

    /// Move the session to another route, keeping its key.
    pub fn set_route(&mut self, route: Option<&str>) {
        self.id = self.id.with_route(route);
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute, returning the previous value. Marks the session dirty.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.touch();
        self.dirty = true;
        self.attributes.insert(name.into(), value)
    }

    /// Remove an attribute. Only marks the session dirty if it was present.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.touch();
            self.dirty = true;
        }
        removed
    }

    /// Record an access now.
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the session as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Mark the session as saved.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Mark the session as written to the backend at `at`.
    pub fn mark_persisted(&mut self, at: DateTime<Utc>) {
        self.dirty = false;
        self.persisted_at = Some(at);
    }

    pub fn persisted_at(&self) -> Option<DateTime<Utc>> {
        self.persisted_at
    }

    /// Whether the backend copy is behind this record: either there are
    /// unsaved changes or the session was accessed after its last write.
    pub fn needs_write_back(&self) -> bool {
        self.dirty || self.persisted_at.is_none_or(|at| self.last_accessed > at)
    }

    pub fn into_ref(self) -> SessionRef {
        Arc::new(Mutex::new(self))
    }
}
