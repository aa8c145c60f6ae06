//! Transport module - USSD aggregator request/response adapters.
//!
//! A USSD aggregator delivers each screen of a dialogue as an HTTP callback.
//! An adapter turns the callback into a session id and a [`Pdu`], and renders
//! the response PDU into the body the aggregator expects.
//!
//! Provides:
//! - [`UssdRequest`] - the callback fields common to aggregators
//! - [`UssdAdapter`] - the decode/parse/render contract
//! - [`AfricasTalkingAdapter`] - Africa's Talking `CON`/`END` bodies
//! - [`TruRouteAdapter`] - TruRoute `<ussd>` XML
//! - [`FlaresAdapter`] - Flares `<request>`/`<response>` XML
//!
//! Every aggregator carries one UDCP message per screen as `<tag><data>`,
//! without the length and separator bytes of the binary frame:
//!
//! ```text
//! ""            -> ReceiveReady
//! "D;HELLO"     -> DataLong("HELLO")
//! "d;HEL"       -> DataWithContinuation("HEL")
//! ```

mod africastalking;
mod flares;
mod truroute;

pub use africastalking::AfricasTalkingAdapter;
pub use flares::FlaresAdapter;
pub use truroute::TruRouteAdapter;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::{Result, UdcpError};
use crate::protocol::{Pdu, PduKind, MAX_USSD_LENGTH, TAG_SIZE};

/// One inbound USSD callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub phone_number: String,
    /// Text the subscriber entered. Empty on the first screen.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
}

/// Converts between an aggregator's callbacks and PDUs.
pub trait UssdAdapter: Send + Sync {
    /// Decode a raw callback body.
    ///
    /// The default accepts the JSON form of [`UssdRequest`].
    fn decode(&self, body: &[u8]) -> Result<UssdRequest> {
        serde_json::from_slice(body).map_err(|e| UdcpError::MalformedBody(e.to_string()))
    }

    /// Extract the session id and request PDU from a callback.
    fn parse(&self, request: &UssdRequest) -> Result<(String, Pdu)> {
        parse_callback(request)
    }

    /// Render the response to `request` as a callback body.
    fn render(&self, request: &UssdRequest, response: &Pdu) -> Result<String>;

    /// Content type of rendered bodies.
    fn content_type(&self) -> &'static str;
}

/// Check the subscriber address and turn the callback text into a PDU.
///
/// # Errors
///
/// - `InvalidAddress` for a missing session id or a malformed phone number
/// - `PayloadTooLarge` if the text exceeds one USSD screen
/// - `InvalidHeader` for a missing or unknown tag
pub fn parse_callback(request: &UssdRequest) -> Result<(String, Pdu)> {
    if request.session_id.is_empty() {
        return Err(UdcpError::InvalidAddress("missing session id".into()));
    }
    if !is_valid_phone_number(&request.phone_number) {
        return Err(UdcpError::InvalidAddress(format!(
            "invalid phone number {:?}",
            request.phone_number
        )));
    }

    let session_id = request.session_id.clone();
    let text = request.text.as_str();
    if text.is_empty() {
        return Ok((session_id, Pdu::receive_ready_request()));
    }
    if text.len() > MAX_USSD_LENGTH {
        return Err(UdcpError::PayloadTooLarge {
            size: text.len(),
            limit: MAX_USSD_LENGTH,
        });
    }

    let tag = text
        .get(..TAG_SIZE)
        .ok_or_else(|| UdcpError::InvalidHeader(format!("no tag in {text:?}")))?;
    let kind = PduKind::from_tag(tag);
    if kind == PduKind::Invalid {
        return Err(UdcpError::InvalidHeader(format!("unknown tag {tag:?}")));
    }

    let data = &text.as_bytes()[TAG_SIZE..];
    let pdu = if kind.is_data() {
        Pdu::data_request(data, kind.has_more_to_send())
    } else {
        Pdu::new(kind, Bytes::copy_from_slice(data))
    };
    Ok((session_id, pdu))
}

/// Check if `response` ends the dialogue on the network side.
pub(crate) fn ends_dialogue(response: &Pdu) -> bool {
    response.is_error_pdu() || response.is_release_dialogue_pdu()
}

/// Check that `number` looks like an E.164 subscriber number.
pub(crate) fn is_valid_phone_number(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}
