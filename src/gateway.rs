//! Gateway builder and request entry point.
//!
//! The [`GatewayBuilder`] provides a fluent API for registering applications
//! and choosing a session store. The [`Gateway`] runs one turn per inbound
//! request:
//! 1. Take the turn lock of the request's session id
//! 2. Load (or create) the session from the store
//! 3. Bind it to the application for this turn only
//! 4. Run the protocol engine under the turn deadline
//! 5. Turn any error into a response PDU
//!
//! Turns of the same session run one at a time. Turns of different sessions
//! run concurrently.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use udcp_server::application::EchoApplication;
//! use udcp_server::protocol::Pdu;
//! use udcp_server::Gateway;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> udcp_server::Result<()> {
//! let gateway = Gateway::builder()
//!     .application(Arc::new(EchoApplication::new()))
//!     .build()?;
//!
//! let response = gateway.handle("session-1", &Pdu::data_request(b"HELLO", false)).await;
//! assert_eq!(response.payload(), b"HELLO");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::{in_turn_scope, Application, MultiplexingApplication};
use crate::config::GatewayConfig;
use crate::engine::process_request;
use crate::error::{Result, UdcpError};
use crate::protocol::{FrameBuffer, Pdu};
use crate::session::{FileStore, MemoryStore, Session, SessionStore, SharedSession};
use crate::transport::{UssdAdapter, UssdRequest};

/// Builder for configuring and creating a [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn SessionStore>>,
    applications: Vec<Arc<dyn Application>>,
}

impl GatewayBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            store: None,
            applications: Vec::new(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an application. The first one registered serves requests.
    pub fn application(mut self, application: Arc<dyn Application>) -> Self {
        self.applications.push(application);
        self
    }

    /// Use `store` for sessions, overriding `store_path`.
    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the deadline for one turn.
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the maximum size of a session's receive buffer.
    ///
    /// Default: 8096 bytes
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.config.max_buffer_size = size;
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// - `NoApplications` if no application was registered
    /// - `SessionPersist` if the file store cannot be opened
    /// - any error from an application's `register`
    pub fn build(self) -> Result<Gateway> {
        let store: Arc<dyn SessionStore> = match (self.store, &self.config.store_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(FileStore::open(path)?),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        let application = MultiplexingApplication::new(self.applications)?;
        application.register()?;

        tracing::debug!(
            application = application.current().application_id(),
            timeout_ms = self.config.request_timeout_ms,
            "gateway ready"
        );

        Ok(Gateway {
            application,
            store,
            config: self.config,
            session_locks: DashMap::new(),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point for inbound USSD turns.
pub struct Gateway {
    application: MultiplexingApplication,
    store: Arc<dyn SessionStore>,
    config: GatewayConfig,
    /// Turn lock per session id with a turn in flight.
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of one turn. Dropping it releases the session and
/// removes the lock entry once no other turn is waiting on it.
struct TurnGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    session_id: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl Gateway {
    /// Create a new gateway builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Handle one request for `session_id` and return the response PDU.
    ///
    /// Never fails: errors are reported to the client as Error PDUs, and a
    /// turn that exceeds the deadline ends the dialogue.
    pub async fn handle(&self, session_id: &str, request: &Pdu) -> Pdu {
        self.respond(session_id, Some(request)).await
    }

    /// Handle a body of wire frames for `session_id` and return the encoded
    /// responses.
    ///
    /// Frames are handled in order and their responses concatenated. An
    /// empty body is answered like a missing request, and a trailing partial
    /// frame adds an Error PDU after the responses to the complete ones.
    pub async fn handle_frame(&self, session_id: &str, body: &[u8]) -> Vec<u8> {
        let mut frames = FrameBuffer::new();
        let requests = match frames.push(body) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(session_id, "Failed to decode frame: {}", e);
                return encode_response(session_id, &e.to_pdu());
            }
        };

        let mut out = Vec::new();
        if requests.is_empty() && !frames.has_partial_frame() {
            let response = self.respond(session_id, None).await;
            out.extend(encode_response(session_id, &response));
        }
        for request in &requests {
            let response = self.respond(session_id, Some(request)).await;
            out.extend(encode_response(session_id, &response));
        }
        if frames.has_partial_frame() {
            tracing::warn!(session_id, leftover = frames.len(), "truncated frame in body");
            let e = UdcpError::InvalidHeader("truncated frame".into());
            out.extend(encode_response(session_id, &e.to_pdu()));
        }
        out
    }

    /// Handle one decoded aggregator callback and return the rendered body.
    pub async fn handle_ussd(&self, adapter: &dyn UssdAdapter, request: &UssdRequest) -> String {
        let response = match adapter.parse(request) {
            Ok((session_id, pdu)) => self.respond(&session_id, Some(&pdu)).await,
            Err(e) => {
                tracing::warn!(
                    session_id = %request.session_id,
                    "Failed to parse USSD request: {}",
                    e
                );
                e.to_pdu()
            }
        };
        render_response(adapter, request, &response)
    }

    /// Handle one raw aggregator callback body and return the rendered body.
    pub async fn handle_body(&self, adapter: &dyn UssdAdapter, body: &[u8]) -> String {
        match adapter.decode(body) {
            Ok(request) => self.handle_ussd(adapter, &request).await,
            Err(e) => {
                tracing::warn!("Failed to decode USSD callback: {}", e);
                render_response(adapter, &UssdRequest::default(), &e.to_pdu())
            }
        }
    }

    /// The application requests are dispatched to.
    pub fn application(&self) -> &MultiplexingApplication {
        &self.application
    }

    /// The session store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn respond(&self, session_id: &str, request: Option<&Pdu>) -> Pdu {
        match self.try_handle(session_id, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session_id, "Turn failed: {}", e);
                e.to_pdu()
            }
        }
    }

    async fn try_handle(&self, session_id: &str, request: Option<&Pdu>) -> Result<Pdu> {
        if session_id.is_empty() {
            return Err(UdcpError::InvalidAddress("empty session id".into()));
        }

        let _turn = self.lock_session(session_id).await;

        let session = Session::get_or_create(session_id, self.store.clone())?;
        if let Some(request) = request.filter(|r| r.is_data_pdu()) {
            let size = session.recv_buffer().len() + request.len();
            if size > self.config.max_buffer_size {
                return Err(UdcpError::PayloadTooLarge {
                    size,
                    limit: self.config.max_buffer_size,
                });
            }
        }

        let session = session.into_shared();
        let turn = in_turn_scope(async {
            self.application.use_session(session.clone());
            process_request(request, &self.application).await
        });
        let outcome = tokio::time::timeout(self.config.request_timeout(), turn).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    session_id,
                    timeout_ms = self.config.request_timeout_ms,
                    "turn timed out"
                );
                drop_dialogue(&session).await;
                Err(UdcpError::Timeout)
            }
        }
    }

    async fn lock_session<'a>(&'a self, session_id: &'a str) -> TurnGuard<'a> {
        let lock = self
            .session_locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let mut turn = TurnGuard {
            locks: &self.session_locks,
            session_id,
            guard: None,
        };
        turn.guard = Some(lock.lock_owned().await);
        turn
    }
}

fn encode_response(session_id: &str, response: &Pdu) -> Vec<u8> {
    match response.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(session_id, "Failed to encode response: {}", e);
            e.to_pdu().encode().unwrap_or_default()
        }
    }
}

fn render_response(adapter: &dyn UssdAdapter, request: &UssdRequest, response: &Pdu) -> String {
    match adapter.render(request, response) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(session_id = %request.session_id, "Failed to render response: {}", e);
            adapter.render(request, &e.to_pdu()).unwrap_or_default()
        }
    }
}

async fn drop_dialogue(session: &SharedSession) {
    let mut session = session.lock().await;
    if let Err(e) = session.reset() {
        tracing::error!(session_id = session.id(), "Failed to reset session: {}", e);
    }
}
