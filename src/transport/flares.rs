//! Flares USSD adapter.
//!
//! ```text
//! request:  <request><subscriberInput>D;HI</subscriberInput><sessionId>..</sessionId><msisdn>..</msisdn></request>
//! response: <response><applicationResponse>HI</applicationResponse><sessionId>..</sessionId><msisdn>..</msisdn></response>
//! ```

use serde::{Deserialize, Serialize};

use super::{UssdAdapter, UssdRequest};
use crate::error::{Result, UdcpError};
use crate::protocol::Pdu;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlaresRequest {
    #[serde(default)]
    subscriber_input: String,
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    msisdn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "response", rename_all = "camelCase")]
struct FlaresResponse<'a> {
    application_response: &'a str,
    session_id: &'a str,
    msisdn: &'a str,
}

/// Adapter for the Flares XML USSD API.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlaresAdapter;

impl FlaresAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl UssdAdapter for FlaresAdapter {
    fn decode(&self, body: &[u8]) -> Result<UssdRequest> {
        let xml = std::str::from_utf8(body).map_err(|e| UdcpError::MalformedBody(e.to_string()))?;
        let request: FlaresRequest =
            quick_xml::de::from_str(xml).map_err(|e| UdcpError::MalformedBody(e.to_string()))?;

        if request.session_id.is_empty() || request.msisdn.is_empty() {
            return Err(UdcpError::InvalidAddress(
                "Flares request without sessionId or msisdn".into(),
            ));
        }

        Ok(UssdRequest {
            session_id: request.session_id,
            channel: Some(request.msisdn.clone()),
            phone_number: request.msisdn,
            text: request.subscriber_input,
            service_code: None,
        })
    }

    fn render(&self, request: &UssdRequest, response: &Pdu) -> Result<String> {
        let payload = String::from_utf8_lossy(response.payload());
        let body = FlaresResponse {
            application_response: &payload,
            session_id: &request.session_id,
            msisdn: &request.phone_number,
        };
        quick_xml::se::to_string(&body).map_err(|e| UdcpError::Render(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "text/xml; charset=ascii"
    }
}
