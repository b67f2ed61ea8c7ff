//! Store lifecycle: Uninitialized -> Initialized -> Started -> Stopped
//!
//! The lifecycle owns the store's backing resource (a connection pool or an
//! in-memory map) so the resource exists exactly while the store can use it.

use parking_lot::Mutex;
use tracing::info;

use crate::error::{SessionError, SessionResult};
use crate::session::SessionContext;

/// Lifecycle phase of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Started,
    Stopped,
}

enum State<R> {
    Uninitialized,
    Initialized(Active<R>),
    Started(Active<R>),
    Stopped,
}

struct Active<R> {
    context: SessionContext,
    resource: R,
}

/// State machine guarding a store's backing resource
pub(crate) struct Lifecycle<R> {
    name: &'static str,
    state: Mutex<State<R>>,
}

impl<R: Clone> Lifecycle<R> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::Uninitialized),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        match *self.state.lock() {
            State::Uninitialized => Phase::Uninitialized,
            State::Initialized(_) => Phase::Initialized,
            State::Started(_) => Phase::Started,
            State::Stopped => Phase::Stopped,
        }
    }

    /// Bind the context and create the resource.
    ///
    /// Allowed from Uninitialized or Stopped; the resource is only created
    /// once the transition is known to be legal.
    pub(crate) fn initialize<F>(&self, context: SessionContext, create: F) -> SessionResult<()>
    where
        F: FnOnce() -> SessionResult<R>,
    {
        let mut state = self.state.lock();
        match *state {
            State::Started(_) => {
                return Err(SessionError::Lifecycle(format!(
                    "context set after {} started",
                    self.name
                )))
            }
            State::Initialized(_) => {
                return Err(SessionError::Lifecycle(format!(
                    "{} already initialized",
                    self.name
                )))
            }
            State::Uninitialized | State::Stopped => {}
        }

        let resource = create()?;
        *state = State::Initialized(Active { context, resource });
        info!(store = self.name, "session store initialized");
        Ok(())
    }

    /// Move to Started. Starting an already started store is a no-op.
    pub(crate) fn start(&self) -> SessionResult<()> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Initialized(active) => {
                *state = State::Started(active);
                info!(store = self.name, "session store started");
                Ok(())
            }
            started @ State::Started(_) => {
                *state = started;
                Ok(())
            }
            previous => {
                *state = previous;
                Err(SessionError::Lifecycle(format!(
                    "{} has no session context",
                    self.name
                )))
            }
        }
    }

    /// Move to Stopped and hand back the resource for release.
    ///
    /// Returns `None` when there was nothing to release, so repeated calls
    /// release the resource exactly once.
    pub(crate) fn stop(&self) -> Option<R> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Initialized(active) | State::Started(active) => {
                info!(store = self.name, "session store stopped");
                Some(active.resource)
            }
            State::Uninitialized => {
                *state = State::Uninitialized;
                None
            }
            State::Stopped => None,
        }
    }

    /// Resource and context for one operation; fails unless Started.
    pub(crate) fn acquire(&self) -> SessionResult<(R, SessionContext)> {
        match &*self.state.lock() {
            State::Started(active) => Ok((active.resource.clone(), active.context.clone())),
            _ => Err(SessionError::not_started()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn context() -> SessionContext {
        SessionContext::new("/", "localhost")
    }

    #[test]
    fn test_happy_path() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);

        lifecycle.initialize(context(), || Ok(7)).unwrap();
        assert_eq!(lifecycle.phase(), Phase::Initialized);
        assert!(lifecycle.acquire().unwrap_err().is_lifecycle());

        lifecycle.start().unwrap();
        let (resource, ctx) = lifecycle.acquire().unwrap();
        assert_eq!(resource, 7);
        assert_eq!(ctx, context());

        assert_eq!(lifecycle.stop(), Some(7));
        assert_eq!(lifecycle.phase(), Phase::Stopped);
        assert!(lifecycle.acquire().unwrap_err().is_lifecycle());
    }

    #[test]
    fn test_start_without_context_fails() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        assert!(lifecycle.start().unwrap_err().is_lifecycle());
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_initialize_after_start_fails_without_creating() {
        let created = Arc::new(AtomicUsize::new(0));
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        let counter = Arc::clone(&created);
        lifecycle
            .initialize(context(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .unwrap();
        lifecycle.start().unwrap();

        let counter = Arc::clone(&created);
        let err = lifecycle
            .initialize(context(), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .unwrap_err();
        assert!(err.is_lifecycle());
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_initialize_fails() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        lifecycle.initialize(context(), || Ok(1)).unwrap();
        assert!(lifecycle.initialize(context(), || Ok(2)).is_err());
    }

    #[test]
    fn test_stop_releases_once() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        assert_eq!(lifecycle.stop(), None);
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);

        lifecycle.initialize(context(), || Ok(3)).unwrap();
        lifecycle.start().unwrap();
        assert_eq!(lifecycle.stop(), Some(3));
        assert_eq!(lifecycle.stop(), None);
    }

    #[test]
    fn test_stop_before_start_releases() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        lifecycle.initialize(context(), || Ok(3)).unwrap();
        assert_eq!(lifecycle.stop(), Some(3));
    }

    #[test]
    fn test_restart_after_stop() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        lifecycle.initialize(context(), || Ok(1)).unwrap();
        lifecycle.start().unwrap();
        lifecycle.stop();

        assert!(lifecycle.start().is_err());
        lifecycle.initialize(context(), || Ok(2)).unwrap();
        lifecycle.start().unwrap();
        assert_eq!(lifecycle.acquire().unwrap().0, 2);
    }

    #[test]
    fn test_failed_create_leaves_state() {
        let lifecycle: Lifecycle<u32> = Lifecycle::new("test");
        let err = lifecycle
            .initialize(context(), || Err(SessionError::Config("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert_eq!(lifecycle.phase(), Phase::Uninitialized);
    }
}
