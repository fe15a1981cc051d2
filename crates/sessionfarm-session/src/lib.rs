//! Route-aware session management for a load-balanced server farm.
//!
//! Sessions are mirrored to a shared backend so any node can serve them,
//! while a route suffix in the session id (`<key>.<route>`) keeps traffic
//! pinned to the node that last served it.
//!
//! - [`identity`]: composite id codec
//! - [`SessionStoreManager`]: local-vs-backend lookup, dirty tracking and
//!   expiry reconciliation
//! - [`RouteRewriteGateway`]: rewrites the client's id after a re-home
//! - [`ExpirySweeper`]: periodic expiry pass on a tokio runtime
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sessionfarm_backend::BackendRegistry;
//! use sessionfarm_session::{JsonCodec, SessionLifecycleParticipant, SessionStoreManager};
//!
//! let manager = SessionStoreManager::new(config, Arc::new(JsonCodec));
//! manager.init(&BackendRegistry::default())?;
//! let resolved = manager.find("abc.host2")?;
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod gateway;
pub mod identity;
pub mod local;
pub mod manager;
pub mod session;
pub mod sweeper;

pub use codec::{JsonCodec, SessionCodec};
pub use error::{Error, Result};
pub use events::{SessionEvent, SessionListener};
pub use gateway::{GatewayOutcome, RequestContext, RouteRewriteGateway};
pub use identity::{SEPARATOR, SessionId};
pub use local::LocalSessions;
pub use manager::{
    ExpiryReport, LookupState, Resolved, SessionLifecycleParticipant, SessionStoreManager,
};
pub use session::{Session, SessionRef};
pub use sweeper::ExpirySweeper;
