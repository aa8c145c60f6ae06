//! Africa's Talking USSD adapter.
//!
//! Each callback's `text` field carries one UDCP message. Responses are
//! rendered as `CON <payload>` to keep the dialogue open, or
//! `END <payload>` for Error and ReleaseDialogue PDUs.

use super::{ends_dialogue, UssdAdapter, UssdRequest};
use crate::error::Result;
use crate::protocol::Pdu;

/// Adapter for the Africa's Talking USSD API.
#[derive(Debug, Clone, Copy, Default)]
pub struct AfricasTalkingAdapter;

impl AfricasTalkingAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl UssdAdapter for AfricasTalkingAdapter {
    fn render(&self, _request: &UssdRequest, response: &Pdu) -> Result<String> {
        let prefix = if ends_dialogue(response) { "END" } else { "CON" };
        Ok(format!(
            "{} {}",
            prefix,
            String::from_utf8_lossy(response.payload())
        ))
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=ascii"
    }
}
