//! Session store error types

use thiserror::Error;

/// Result type for session store operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while persisting or restoring session data
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid host, port, URI or pool settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted outside the started window
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Error reported by the redis client (connect, auth, command)
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connect, checkout or socket timeout elapsed
    #[error("Operation timed out: {0}")]
    Timeout(&'static str),

    /// Stored bytes do not match the expected frame
    #[error("Corrupt session record: {0}")]
    Decode(String),

    /// Session attributes could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// Whether the error came from talking to the remote store.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Redis(_) | Self::Timeout(_))
    }

    /// Whether a stored payload was found but could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Whether the store was used before `start` or after `stop`.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle(_))
    }

    pub(crate) fn not_started() -> Self {
        Self::Lifecycle("session store not started".to_string())
    }
}
