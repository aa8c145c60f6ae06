//! TruRoute USSD adapter.
//!
//! TruRoute posts and expects `<ussd>` XML documents:
//!
//! ```text
//! request:  <ussd><type>2</type><msg>D;HI</msg><sessionid>..</sessionid><msisdn>..</msisdn></ussd>
//! response: <ussd><type>2</type><msg>HI</msg><premium><cost>0</cost><ref></ref></premium><msisdn>..</msisdn></ussd>
//! ```
//!
//! Request type 1 opens the dialogue and its `msg` is the dialled service
//! code, so it is treated as a ReceiveReady poll. Response type 2 keeps the
//! dialogue open and type 3 releases it.

use serde::{Deserialize, Serialize};

use super::{ends_dialogue, UssdAdapter, UssdRequest};
use crate::error::{Result, UdcpError};
use crate::protocol::Pdu;

const INITIAL_REQUEST: u8 = 1;
const CONTINUE_RESPONSE: u8 = 2;
const RELEASE_RESPONSE: u8 = 3;

#[derive(Debug, Deserialize)]
struct TruRouteRequest {
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    sessionid: String,
    #[serde(default)]
    msisdn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "ussd")]
struct TruRouteResponse<'a> {
    #[serde(rename = "type")]
    kind: u8,
    msg: &'a str,
    premium: Premium<'a>,
    msisdn: &'a str,
}

#[derive(Debug, Serialize)]
struct Premium<'a> {
    cost: u32,
    #[serde(rename = "ref")]
    reference: &'a str,
}

/// Adapter for the TruRoute XML USSD API.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruRouteAdapter;

impl TruRouteAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl UssdAdapter for TruRouteAdapter {
    fn decode(&self, body: &[u8]) -> Result<UssdRequest> {
        let xml = std::str::from_utf8(body).map_err(|e| UdcpError::MalformedBody(e.to_string()))?;
        let request: TruRouteRequest =
            quick_xml::de::from_str(xml).map_err(|e| UdcpError::MalformedBody(e.to_string()))?;

        if request.sessionid.is_empty() || request.msisdn.is_empty() {
            return Err(UdcpError::InvalidAddress(
                "TruRoute request without sessionid or msisdn".into(),
            ));
        }

        let (text, service_code) = if request.kind == INITIAL_REQUEST {
            (String::new(), Some(request.msg))
        } else {
            (request.msg, None)
        };
        Ok(UssdRequest {
            session_id: request.sessionid,
            channel: Some(request.msisdn.clone()),
            phone_number: request.msisdn,
            text,
            service_code,
        })
    }

    fn render(&self, request: &UssdRequest, response: &Pdu) -> Result<String> {
        let kind = if ends_dialogue(response) {
            RELEASE_RESPONSE
        } else {
            CONTINUE_RESPONSE
        };
        let msg = String::from_utf8_lossy(response.payload());
        let body = TruRouteResponse {
            kind,
            msg: &msg,
            premium: Premium {
                cost: 0,
                reference: "",
            },
            msisdn: &request.phone_number,
        };
        quick_xml::se::to_string(&body).map_err(|e| UdcpError::Render(e.to_string()))
    }

    fn content_type(&self) -> &'static str {
        "text/xml; charset=ascii"
    }
}
