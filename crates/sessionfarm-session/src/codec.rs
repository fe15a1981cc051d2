//! Session payload encoding.
//!
//! The backend stores opaque bytes. A [`SessionCodec`] turns a [`Session`]
//! into those bytes and back. Codecs report failure as `None`; the manager
//! decides what a failure means for the calling operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::session::Session;

/// Encodes sessions for the backend.
pub trait SessionCodec: Send + Sync {
    /// Encode the session's durable state. `None` on failure.
    fn serialize(&self, session: &Session) -> Option<Vec<u8>>;

    /// Populate `shell` from `bytes`. The shell's id is kept, so the caller
    /// controls which route the decoded session carries. `None` on failure.
    fn deserialize(&self, shell: Session, bytes: &[u8]) -> Option<Session>;
}

/// Durable part of a session as written by [`JsonCodec`].
#[derive(Serialize, Deserialize)]
struct Payload {
    attributes: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

/// JSON session codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl SessionCodec for JsonCodec {
    fn serialize(&self, session: &Session) -> Option<Vec<u8>> {
        let payload = Payload {
            attributes: session.attributes.clone(),
            created_at: session.created_at,
            last_accessed: session.last_accessed,
        };
        match serde_json::to_vec(&payload) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(session_id = %session.id(), error = %e, "Failed to encode session");
                None
            }
        }
    }

    fn deserialize(&self, mut shell: Session, bytes: &[u8]) -> Option<Session> {
        match serde_json::from_slice::<Payload>(bytes) {
            Ok(payload) => {
                shell.attributes = payload.attributes;
                shell.created_at = payload.created_at;
                shell.last_accessed = payload.last_accessed;
                Some(shell)
            }
            Err(e) => {
                warn!(session_id = %shell.id(), error = %e, "Failed to decode session");
                None
            }
        }
    }
}
