//! Session data map trait

use async_trait::async_trait;

use crate::error::SessionError;
use crate::lifecycle::Phase;
use crate::session::{SessionContext, SessionRecord};

/// Persistence backend for session records.
///
/// Lifecycle: `initialize` binds the host's context and creates the backing
/// resource, `start` opens the store for use and `stop` releases the resource.
/// `load`, `store` and `delete` fail with a lifecycle error outside the
/// started window.
#[async_trait]
pub trait SessionDataMap: Send + Sync + 'static {
    /// Bind the context records are loaded into and create the backend.
    fn initialize(&self, context: SessionContext) -> Result<(), SessionError>;

    /// Open the store; fails if `initialize` was never called.
    fn start(&self) -> Result<(), SessionError>;

    /// Release the backend. Safe to call repeatedly or before `start`.
    fn stop(&self);

    fn phase(&self) -> Phase;

    /// Load a session by ID
    ///
    /// Returns None if no session is stored under the id, or the stored
    /// payload is too short to hold a frame.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Store a session, replacing whatever was stored under the id
    async fn store(&self, id: &str, record: &SessionRecord) -> Result<(), SessionError>;

    /// Delete a session; returns whether anything was removed
    async fn delete(&self, id: &str) -> Result<bool, SessionError>;
}
