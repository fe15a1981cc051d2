//! Error types for session management.

use sessionfarm_config::ConfigError;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend failed or refused the operation.
    #[error("Backend error: {0}")]
    Backend(#[from] sessionfarm_backend::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A session id that cannot be split into key and route.
    #[error("Malformed session identifier: {0:?}")]
    MalformedIdentifier(String),

    /// Operation not allowed in the manager's current state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The session codec could not encode or decode a payload.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No local session with this id.
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
