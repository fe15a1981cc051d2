//! Node-local session store manager.
//!
//! Decides per lookup whether the local record can be trusted or the session
//! has to be refreshed from the shared backend, persists every change as it
//! happens, and reconciles the backend's expiry sweep with local state.
//!
//! # Lookup states
//!
//! | Incoming id                         | Local record | Result         |
//! |-------------------------------------|--------------|----------------|
//! | route equals this node's route      | present      | `LocalHit`     |
//! | route equals this node's route      | absent       | `NeedsRefresh` |
//! | no route, other route, or no local route | any     | `NeedsRefresh` |
//!
//! A refresh that finds nothing in the backend creates a new session
//! (`NewSession`).

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use sessionfarm_backend::{BackendRegistry, BackendService, BackendSpec, ExpiryThreshold};
use sessionfarm_config::{HasStoreConfig, StoreConfig};
use tracing::{debug, error, info, warn};

use crate::codec::SessionCodec;
use crate::error::{Error, Result};
use crate::events::{Listeners, SessionEvent, SessionListener};
use crate::identity::{self, SessionId};
use crate::local::LocalSessions;
use crate::session::{Session, SessionRef};

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupState {
    /// Served from this node's record without touching the backend.
    LocalHit,
    /// Fetched from the backend and re-homed to this node.
    NeedsRefresh,
    /// Nothing found anywhere; a new session was created.
    NewSession,
}

/// Result of [`SessionLifecycleParticipant::find`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: SessionRef,
    pub state: LookupState,
}

impl Resolved {
    /// Composite id of the resolved session.
    pub fn id(&self) -> String {
        self.session.lock().id().to_string()
    }
}

/// Outcome of one [`SessionStoreManager::process_expires`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryReport {
    /// Keys the backend removed.
    pub removed_remotely: Vec<String>,
    /// Local ids dropped because they were idle here too.
    pub removed_locally: Vec<String>,
    /// Local ids written back because this node touched them more recently.
    pub resurrected: Vec<String>,
    /// Local ids whose write-back failed.
    pub failed: Vec<String>,
}

/// What the host's session container calls into.
///
/// The container adapter translates its own callbacks into these calls.
pub trait SessionLifecycleParticipant: Send + Sync {
    /// Create a session. A requested id contributes its key; the route is
    /// always this node's.
    fn create(&self, requested_id: Option<&str>) -> Result<SessionRef>;

    /// Resolve an incoming composite id.
    fn find(&self, id: &str) -> Result<Resolved>;

    /// Delete the session everywhere.
    fn destroy(&self, id: &str) -> Result<()>;

    /// Handle an event raised by the host.
    fn on_event(&self, event: SessionEvent) -> Result<()>;
}

/// Route-aware session manager for one node.
pub struct SessionStoreManager {
    config: StoreConfig,
    codec: Arc<dyn SessionCodec>,
    backend: RwLock<Option<Arc<dyn BackendService>>>,
    local: LocalSessions,
    listeners: Listeners,
}

impl SessionStoreManager {
    /// Create a manager without a backend. Call [`init`](Self::init) or
    /// [`with_backend`](Self::with_backend) before use.
    pub fn new(config: StoreConfig, codec: Arc<dyn SessionCodec>) -> Self {
        let local = LocalSessions::new(config.max_sessions());
        Self {
            config,
            codec,
            backend: RwLock::new(None),
            local,
            listeners: Listeners::default(),
        }
    }

    /// Use an already constructed backend. `init` still initialises it.
    pub fn with_backend(self, backend: Arc<dyn BackendService>) -> Self {
        *self.backend.write() = Some(backend);
        self
    }

    /// Build the configured backend (unless one was injected) and initialise it.
    ///
    /// # Errors
    ///
    /// Returns a backend `Configuration` error for an unknown kind, a
    /// malformed address or an invalid expiry threshold.
    pub fn init(&self, registry: &BackendRegistry) -> Result<()> {
        let configured = self.expiry_threshold()?;

        let backend = match self.backend.read().clone() {
            Some(backend) => backend,
            None => registry.build(&BackendSpec::from_config(&self.config.backend)?)?,
        };
        backend.init()?;
        if backend.expiry_threshold() != configured {
            debug!(
                configured = ?configured,
                backend = ?backend.expiry_threshold(),
                "Expiry threshold differs from the backend's, reconciling by the backend's"
            );
        }
        *self.backend.write() = Some(backend);

        info!(
            route = self.route().unwrap_or("-"),
            kind = %self.config.backend.kind,
            "Session store manager initialised"
        );
        Ok(())
    }

    /// Write back sessions the backend copy is behind on, then shut the
    /// backend down.
    pub fn shutdown(&self) {
        let Some(backend) = self.backend.read().clone() else {
            return;
        };

        let mut flushed = 0usize;
        for (id, session) in self.local.sessions() {
            match self.write_back(&session) {
                Ok(true) => flushed += 1,
                Ok(false) => {}
                Err(e) => error!(session_id = %id, error = %e, "Failed to flush session at shutdown"),
            }
        }

        backend.shutdown();
        info!(flushed, "Session store manager shut down");
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// This node's route, if sticky routing is enabled.
    pub fn route(&self) -> Option<&str> {
        self.config.route()
    }

    pub fn backend_service(&self) -> Option<Arc<dyn BackendService>> {
        self.backend.read().clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners.add(listener);
    }

    /// Number of sessions held on this node.
    pub fn session_count(&self) -> usize {
        self.local.len()
    }

    /// The local record for a composite id, without consulting the backend.
    pub fn local_session(&self, id: &str) -> Option<SessionRef> {
        self.local.peek(id)
    }

    /// Set an attribute on a local session and persist it.
    pub fn set_attribute(&self, id: &str, name: &str, value: Value) -> Result<()> {
        let session = self.require_local(id)?;
        let snapshot = {
            let mut guard = session.lock();
            guard.set_attribute(name, value);
            guard.clone()
        };
        self.listeners.attribute_changed(&snapshot, name);
        self.store_session(&session).map(|_| ())
    }

    /// Remove an attribute from a local session and persist if it was set.
    pub fn remove_attribute(&self, id: &str, name: &str) -> Result<Option<Value>> {
        let session = self.require_local(id)?;
        let (removed, snapshot) = {
            let mut guard = session.lock();
            let removed = guard.remove_attribute(name);
            let snapshot = removed.is_some().then(|| guard.clone());
            (removed, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.listeners.attribute_changed(&snapshot, name);
        }
        self.store_session(&session)?;
        Ok(removed)
    }

    /// Persist the session if it has unsaved changes.
    ///
    /// Returns whether a backend write happened. A clean session is never
    /// written.
    pub fn store_session(&self, session: &SessionRef) -> Result<bool> {
        let mut guard = session.lock();
        if !guard.is_dirty() {
            return Ok(false);
        }

        let backend = self.backend()?;
        let bytes = self.codec.serialize(&guard).ok_or_else(|| {
            Error::Serialization(format!("could not encode session {}", guard.id()))
        })?;
        backend.persist(guard.key(), &bytes)?;
        guard.mark_persisted(Utc::now());

        debug!(session_id = %guard.id(), bytes = bytes.len(), "Persisted session");
        Ok(true)
    }

    /// Persist the local session `id` if dirty. An unknown id is a no-op.
    pub fn store(&self, id: &str) -> Result<bool> {
        match self.local.peek(id) {
            Some(session) => self.store_session(&session),
            None => Ok(false),
        }
    }

    /// Reconcile the backend's expiry sweep with local state.
    ///
    /// For each key the backend removed, the local record (if any) is either
    /// dropped, when it is idle here as well, or written back, when this node
    /// touched it after the expiry cutoff. The cutoff uses the backend's own
    /// threshold, the one its sweep applied.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if no backend is configured.
    pub fn process_expires(&self) -> Result<ExpiryReport> {
        let backend = self.backend()?;
        let cutoff = backend.expiry_threshold().cutoff(Utc::now());

        let removed = backend.remove_expired()?;
        let mut report = ExpiryReport::default();

        for key in &removed {
            let local_id = identity::join(key, self.route());
            let Some(session) = self.local.peek(&local_id) else {
                continue;
            };

            let idle_here = {
                let guard = session.lock();
                cutoff.is_some_and(|cutoff| guard.last_accessed < cutoff)
            };

            if idle_here {
                self.local.remove(&local_id);
                let snapshot = {
                    let mut guard = session.lock();
                    guard.set_valid(false);
                    guard.clone()
                };
                self.listeners.destroyed(&snapshot);
                debug!(session_id = %local_id, "Expired session removed locally");
                report.removed_locally.push(local_id);
            } else {
                session.lock().mark_dirty();
                match self.store_session(&session) {
                    Ok(_) => {
                        debug!(session_id = %local_id, "Resurrected session touched after expiry cutoff");
                        report.resurrected.push(local_id);
                    }
                    Err(e) => {
                        warn!(session_id = %local_id, error = %e, "Failed to resurrect expired session");
                        report.failed.push(local_id);
                    }
                }
            }
        }

        report.removed_remotely = removed;
        if !report.removed_remotely.is_empty() {
            info!(
                removed_remotely = report.removed_remotely.len(),
                removed_locally = report.removed_locally.len(),
                resurrected = report.resurrected.len(),
                failed = report.failed.len(),
                "Processed expired sessions"
            );
        }
        Ok(report)
    }

    fn backend(&self) -> Result<Arc<dyn BackendService>> {
        self.backend
            .read()
            .clone()
            .ok_or_else(|| Error::IllegalState("no backend service configured".to_string()))
    }

    fn expiry_threshold(&self) -> Result<ExpiryThreshold> {
        Ok(ExpiryThreshold::from_millis(self.config.expiry_threshold_ms())?)
    }

    fn require_local(&self, id: &str) -> Result<SessionRef> {
        self.local
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Persist the session if the backend copy is behind this record, so a
    /// session accessed here but not changed keeps a current index entry.
    fn write_back(&self, session: &SessionRef) -> Result<bool> {
        {
            let mut guard = session.lock();
            if !guard.needs_write_back() {
                return Ok(false);
            }
            guard.mark_dirty();
        }
        self.store_session(session)
    }

    /// Register locally, writing back whatever the LRU pushed out.
    fn register(&self, id: String, session: SessionRef) {
        if let Some((evicted_id, evicted)) = self.local.insert(id, session)
            && let Err(e) = self.write_back(&evicted)
        {
            error!(session_id = %evicted_id, error = %e, "Failed to persist evicted session");
        }
    }

    fn new_session(&self, key: String) -> Result<SessionRef> {
        let session = Session::new(SessionId::new(key, self.route())).into_ref();
        self.store_session(&session)?;

        let snapshot = session.lock().clone();
        let id = snapshot.id().to_string();
        self.register(id.clone(), session.clone());
        self.listeners.created(&snapshot);

        debug!(session_id = %id, "Created session");
        Ok(session)
    }

    /// Fetch `key` from the backend and re-home it to this node.
    fn refresh(&self, key: &str) -> Result<Option<SessionRef>> {
        let backend = self.backend()?;
        let Some(bytes) = backend.fetch(key)? else {
            return Ok(None);
        };

        let id = SessionId::new(key, self.route());
        let local_id = id.to_string();
        let mut session = self
            .codec
            .deserialize(Session::shell(id), &bytes)
            .ok_or_else(|| Error::Serialization(format!("could not decode session {key}")))?;
        session.set_valid(true);
        session.set_new(false);
        session.touch();
        session.mark_clean();

        if let Some(existing) = self.local.get(&local_id) {
            *existing.lock() = session;
            debug!(session_id = %local_id, "Refreshed local session from backend");
            return Ok(Some(existing));
        }

        let snapshot = session.clone();
        let session = session.into_ref();
        self.register(local_id.clone(), session.clone());
        self.listeners.created(&snapshot);
        debug!(session_id = %local_id, "Loaded session from backend");
        Ok(Some(session))
    }
}

impl SessionLifecycleParticipant for SessionStoreManager {
    fn create(&self, requested_id: Option<&str>) -> Result<SessionRef> {
        let key = match requested_id {
            Some(id) => identity::key_of(id)?.to_string(),
            None => identity::generate_key(),
        };
        self.new_session(key)
    }

    fn find(&self, id: &str) -> Result<Resolved> {
        let (key, route) = match identity::split(id) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Unusable session id, starting a new session");
                let session = self.new_session(identity::generate_key())?;
                return Ok(Resolved {
                    session,
                    state: LookupState::NewSession,
                });
            }
        };

        if let (Some(route), Some(local_route)) = (route, self.route())
            && route == local_route
            && let Some(session) = self.local.get(id)
        {
            let mut guard = session.lock();
            if guard.is_valid() {
                guard.touch();
                guard.set_new(false);
                drop(guard);
                return Ok(Resolved {
                    session,
                    state: LookupState::LocalHit,
                });
            }
        }

        if let Some(session) = self.refresh(key)? {
            return Ok(Resolved {
                session,
                state: LookupState::NeedsRefresh,
            });
        }

        warn!(session_id = %id, "Session not found locally or in backend, starting a new session");
        let session = self.new_session(identity::generate_key())?;
        Ok(Resolved {
            session,
            state: LookupState::NewSession,
        })
    }

    fn destroy(&self, id: &str) -> Result<()> {
        let key = identity::key_of(id)?;
        self.backend()?.delete(key)?;

        let local_id = identity::join(key, self.route());
        let removed = self.local.remove(&local_id).or_else(|| self.local.remove(id));
        if let Some(session) = removed {
            let snapshot = {
                let mut guard = session.lock();
                guard.set_valid(false);
                guard.clone()
            };
            self.listeners.destroyed(&snapshot);
        }

        debug!(session_id = %id, key = %key, "Destroyed session");
        Ok(())
    }

    fn on_event(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Created { id } => self.store(&id).map(|_| ()),
            SessionEvent::AttributeChanged { id, name } => {
                let session = self.require_local(&id)?;
                let snapshot = {
                    let mut guard = session.lock();
                    guard.touch();
                    guard.mark_dirty();
                    guard.clone()
                };
                self.listeners.attribute_changed(&snapshot, &name);
                self.store_session(&session).map(|_| ())
            }
            SessionEvent::Destroyed { id } => self.destroy(&id),
        }
    }
}
