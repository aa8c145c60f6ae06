//! Front application that forwards every call to a selected application.

use std::sync::Arc;

use super::{Application, ApplicationState, BoxFuture};
use crate::error::{Result, UdcpError};
use crate::protocol::Pdu;
use crate::session::{Session, SharedSession};

const CORE_ID: &str = "udcp:core";
const CORE_AUTHOR: &str = "NNDI";

/// Application that forwards to the current member of a list.
///
/// The first application is current. The multiplexer itself holds no session
/// state; the binding lives in the current application.
pub struct MultiplexingApplication {
    applications: Vec<Arc<dyn Application>>,
    current: usize,
}

impl MultiplexingApplication {
    /// Create a multiplexer over `applications`.
    ///
    /// # Errors
    ///
    /// Returns `NoApplications` if the list is empty.
    pub fn new(applications: Vec<Arc<dyn Application>>) -> Result<Self> {
        if applications.is_empty() {
            return Err(UdcpError::NoApplications);
        }
        Ok(Self {
            applications,
            current: 0,
        })
    }

    /// The application calls are forwarded to.
    pub fn current(&self) -> &Arc<dyn Application> {
        &self.applications[self.current]
    }

    /// All registered applications, in registration order.
    pub fn applications(&self) -> &[Arc<dyn Application>] {
        &self.applications
    }
}

impl Application for MultiplexingApplication {
    fn application_id(&self) -> &str {
        CORE_ID
    }

    fn name(&self) -> &str {
        CORE_ID
    }

    fn author(&self) -> &str {
        CORE_AUTHOR
    }

    fn register(&self) -> Result<()> {
        for app in &self.applications {
            app.register()?;
            tracing::debug!(application = app.application_id(), "application registered");
        }
        Ok(())
    }

    fn current_state(&self, _session_id: &str) -> ApplicationState {
        ApplicationState::Ready
    }

    fn get_or_create_session(&self) -> Option<SharedSession> {
        self.current().get_or_create_session()
    }

    fn use_session(&self, session: SharedSession) {
        self.current().use_session(session)
    }

    fn on_data<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        self.current().on_data(request, session)
    }

    fn on_receive_ready<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        self.current().on_receive_ready(request, session)
    }

    fn on_error<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        self.current().on_error(request, session)
    }

    fn on_release_dialogue<'a>(
        &'a self,
        request: &'a Pdu,
        session: &'a mut Session,
    ) -> BoxFuture<'a, Result<Pdu>> {
        self.current().on_release_dialogue(request, session)
    }
}
