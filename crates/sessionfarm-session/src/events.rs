//! Session lifecycle events.
//!
//! The manager both receives events from the host (to persist changes the
//! host made) and emits them to registered listeners (to notify the host).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::session::Session;

/// Event delivered by the host to the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The host created a session on its own.
    Created { id: String },
    /// The host changed an attribute directly on the session.
    AttributeChanged { id: String, name: String },
    /// The host invalidated the session.
    Destroyed { id: String },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::Created { id } | Self::AttributeChanged { id, .. } | Self::Destroyed { id } => id,
        }
    }
}

/// Receives lifecycle notifications from the manager.
///
/// Listeners receive a copy of the session taken right after the change.
/// The session itself is not locked during the call, so a listener may call
/// back into the manager.
pub trait SessionListener: Send + Sync {
    fn on_created(&self, _session: &Session) {}

    fn on_attribute_changed(&self, _session: &Session, _name: &str) {}

    fn on_destroyed(&self, _session: &Session) {}
}

/// Registered listeners.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn SessionListener>) {
        self.inner.write().push(listener);
    }

    pub(crate) fn created(&self, session: &Session) {
        for listener in self.inner.read().iter() {
            listener.on_created(session);
        }
    }

    pub(crate) fn attribute_changed(&self, session: &Session, name: &str) {
        for listener in self.inner.read().iter() {
            listener.on_attribute_changed(session, name);
        }
    }

    pub(crate) fn destroyed(&self, session: &Session) {
        for listener in self.inner.read().iter() {
            listener.on_destroyed(session);
        }
    }
}
