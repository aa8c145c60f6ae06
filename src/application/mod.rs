//! Application contract and bundled applications.
//!
//! An [`Application`] is the business logic behind a USSD short code. The
//! protocol engine calls one of its four callbacks per turn, handing over the
//! request and the bound [`Session`]:
//!
//! ```text
//! Data (no more)   -> on_data
//! ReceiveReady     -> on_receive_ready
//! Error            -> on_error
//! ReleaseDialogue  -> on_release_dialogue
//! ```
//!
//! Callbacks return boxed futures so applications stay object-safe and can
//! be registered as `Arc<dyn Application>`.

mod echo;
mod multiplex;
mod segment;

pub use echo::EchoApplication;
pub use multiplex::MultiplexingApplication;
pub use segment::{next_chunk, Chunk};

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::protocol::Pdu;
use crate::session::{Session, SharedSession};

/// Boxed future returned by application callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lifecycle state an application reports for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationState {
    Initializing,
    Initialized,
    Ready,
    Stopped,
    Shutdown,
}

impl std::fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
            Self::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Business logic reachable through the gateway.
pub trait Application: Send + Sync {
    /// Unique identifier, e.g. `echo`.
    fn application_id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn author(&self) -> &str;

    /// Called once when the application is registered with a gateway.
    fn register(&self) -> Result<()> {
        Ok(())
    }

    /// State of the application for the given session.
    fn current_state(&self, session_id: &str) -> ApplicationState;

    /// Session bound for the current turn, if any.
    fn get_or_create_session(&self) -> Option<SharedSession>;

    /// Bind the session the next turn operates on.
    fn use_session(&self, session: SharedSession);

    /// Handle a complete inbound message. The full payload is in the
    /// session's receive buffer.
    fn on_data<'a>(&'a self, request: &'a Pdu, session: &'a mut Session)
        -> BoxFuture<'a, Result<Pdu>>;

    /// The client is polling for the next part of the response.
    fn on_receive_ready<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>>;

    /// The client reported an error. The result is logged and discarded.
    fn on_error<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>>;

    /// The client is ending the dialogue. Must answer with a ReleaseDialogue.
    fn on_release_dialogue<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>>;
}

tokio::task_local! {
    /// Session bound by the turn running on the current task.
    static TURN_SESSION: RefCell<Option<SharedSession>>;
}

/// Run `turn` with its own session binding.
///
/// Inside the scope, every [`SessionSlot`] binds to and reads from the
/// turn's binding, so concurrent turns never see each other's session.
pub(crate) async fn in_turn_scope<F: Future>(turn: F) -> F::Output {
    TURN_SESSION.scope(RefCell::new(None), turn).await
}

/// Holder for the session an application is bound to.
///
/// Applications embed one and delegate `use_session` and
/// `get_or_create_session` to it. During a gateway turn the binding is
/// task-local. Outside of one (direct calls to
/// [`process_request`](crate::process_request)) the slot keeps the binding
/// itself.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Mutex<Option<SharedSession>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bound session.
    pub fn bind(&self, session: SharedSession) {
        let mut pending = Some(session);
        let _ = TURN_SESSION.try_with(|bound| *bound.borrow_mut() = pending.take());
        if let Some(session) = pending {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            *current = Some(session);
        }
    }

    /// Get the bound session.
    pub fn get(&self) -> Option<SharedSession> {
        match TURN_SESSION.try_with(|bound| bound.borrow().clone()) {
            Ok(session) => session,
            Err(_) => self
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
