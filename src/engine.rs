//! Protocol state machine: one request in, one response out.
//!
//! ```text
//! Data (more)        -> append to recv          -> ReceiveReady (more)
//! Data (no more)     -> append, commit, on_data -> response, reset if done
//! ReceiveReady       -> on_receive_ready        -> response, reset if done
//! Error              -> on_error (ignored)      -> ReleaseDialogue(UserAbort)
//! ReleaseDialogue    -> on_release_dialogue     -> must be ReleaseDialogue
//! anything else      ->                         -> Error(ProtocolError)
//! ```
//!
//! A turn is "done" when the response does not announce more data; the
//! session is then reset so the next message starts from empty buffers.

use crate::application::Application;
use crate::error::{Result, UdcpError};
use crate::protocol::{Pdu, PduKind};
use crate::session::Session;

/// Run one protocol turn for `request` against `application`.
///
/// The session is taken from `application.get_or_create_session()`.
///
/// # Errors
///
/// - `UnknownParse` if there is no request
/// - `UnsupportedVersion` if the header version is not 1
/// - `SessionNotConfigured` if the application has no bound session
/// - persistence failures and application errors, unchanged
pub async fn process_request(
    request: Option<&Pdu>,
    application: &dyn Application,
) -> Result<Pdu> {
    let request = request.ok_or(UdcpError::UnknownParse)?;
    request.header.validate()?;

    let shared = application
        .get_or_create_session()
        .ok_or(UdcpError::SessionNotConfigured)?;
    let mut session = shared.lock().await;

    tracing::debug!(
        session_id = session.id(),
        kind = %request.kind(),
        len = request.len(),
        more = request.has_more_to_send(),
        "processing request"
    );

    match request.kind() {
        PduKind::Error => {
            if let Err(e) = application.on_error(request, &mut session).await {
                tracing::error!(session_id = session.id(), "Error handler failed: {}", e);
            }
            Ok(Pdu::user_abort())
        }
        PduKind::DataLong | PduKind::DataWithContinuation => {
            handle_data(request, application, &mut session).await
        }
        PduKind::ReceiveReady => {
            let response = application.on_receive_ready(request, &mut session).await?;
            finish_turn(&mut session, response)
        }
        PduKind::ReleaseDialogue => {
            let response = application
                .on_release_dialogue(request, &mut session)
                .await?;
            if response.is_release_dialogue_pdu() {
                Ok(response)
            } else {
                tracing::error!(
                    session_id = session.id(),
                    "application {} answered ReleaseDialogue with {}",
                    application.application_id(),
                    response.kind()
                );
                Ok(Pdu::protocol_error())
            }
        }
        other => {
            tracing::warn!(session_id = session.id(), "unsupported request kind {}", other);
            Ok(Pdu::protocol_error())
        }
    }
}

async fn handle_data(
    request: &Pdu,
    application: &dyn Application,
    session: &mut Session,
) -> Result<Pdu> {
    session.recv_buffer_mut().write(request.payload())?;

    if request.has_more_to_send() {
        return Ok(Pdu::receive_ready_response().answering(request));
    }

    session.commit()?;
    let response = application.on_data(request, session).await?;
    finish_turn(session, response)
}

fn finish_turn(session: &mut Session, response: Pdu) -> Result<Pdu> {
    if !response.has_more_to_send() {
        session.reset()?;
    }
    Ok(response)
}
