//! Echo application: answers every message with its own contents.
//!
//! Responses longer than one screen are split with [`next_chunk`]; the client
//! fetches the remaining chunks with ReceiveReady polls.

use super::{next_chunk, Application, ApplicationState, BoxFuture, SessionSlot};
use crate::error::Result;
use crate::protocol::Pdu;
use crate::session::{Session, SharedSession};

/// Application that sends back whatever it receives.
///
/// The position of the next outbound chunk lives in the session record, so
/// a multi-screen response resumes correctly after a restart.
#[derive(Debug, Default)]
pub struct EchoApplication {
    session: SessionSlot,
}

impl EchoApplication {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the next chunk of the session's send buffer.
    fn flush(&self, request: &Pdu, session: &mut Session) -> Result<Pdu> {
        if session.send_buffer().is_empty() {
            tracing::debug!(session_id = session.id(), "send buffer empty");
            return Ok(Pdu::receive_ready_response());
        }

        let cursor = session.send_cursor();
        let chunk = next_chunk(session.send_buffer(), cursor)?;
        let next = if chunk.more_to_send { chunk.next_cursor } else { 0 };
        session.set_send_cursor(next)?;

        tracing::debug!(
            session_id = session.id(),
            size = session.send_buffer().len(),
            cursor,
            chunk = chunk.data.len(),
            more = chunk.more_to_send,
            "flushing echo"
        );
        Ok(Pdu::data_response(request, &chunk.data, chunk.more_to_send))
    }
}

impl Application for EchoApplication {
    fn application_id(&self) -> &str {
        "echo"
    }

    fn name(&self) -> &str {
        "Echo Application"
    }

    fn author(&self) -> &str {
        "NNDI"
    }

    fn current_state(&self, _session_id: &str) -> ApplicationState {
        ApplicationState::Ready
    }

    fn get_or_create_session(&self) -> Option<SharedSession> {
        self.session.get()
    }

    fn use_session(&self, session: SharedSession) {
        self.session.bind(session)
    }

    fn on_data<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        Box::pin(async move {
            let (recv, send) = session.buffers_mut();
            send.fill_with(recv)?;
            session.set_send_cursor(0)?;
            self.flush(request, session)
        })
    }

    fn on_receive_ready<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        Box::pin(async move { self.flush(request, session) })
    }

    fn on_error<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        Box::pin(async move {
            tracing::warn!(session_id = session.id(), "client reported error: {}", request);
            session.set_send_cursor(0)?;
            Ok(Pdu::protocol_error())
        })
    }

    fn on_release_dialogue<'a>(
        &'a self,
        _request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        Box::pin(async move {
            session.set_send_cursor(0)?;
            Ok(Pdu::user_abort())
        })
    }
}
