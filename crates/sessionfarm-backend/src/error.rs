//! Error types for backend operations.

/// Boxed underlying cause of a backend access failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid backend address, kind or expiry threshold.
    #[error("Backend configuration error: {0}")]
    Configuration(String),

    /// Operation attempted before `init` or after `shutdown`.
    #[error("Backend service unavailable: {0}")]
    ServiceUnavailable(String),

    /// I/O or protocol failure talking to the backing store.
    #[error("Backend access failed during {operation}: {source}")]
    BackendAccess {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap an underlying failure for the named operation.
    pub fn access(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::BackendAccess {
            operation,
            source: source.into(),
        }
    }

    /// Whether this error means the service is terminal (not transient).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
