//! PDU struct with typed accessors and constructors.
//!
//! A [`Pdu`] is one framed message: a header and a payload. Responses keep a
//! back-reference to the request they answer.
//!
//! # Example
//!
//! ```
//! use udcp_server::protocol::{Pdu, PduKind};
//!
//! let request = Pdu::data_request(b"HELLO", false);
//! assert_eq!(request.kind(), PduKind::DataLong);
//!
//! let response = Pdu::data_response(&request, b"HELLO", false);
//! assert!(response.is_data_pdu());
//! assert_eq!(response.request().map(Pdu::payload), Some(&b"HELLO"[..]));
//! ```

use bytes::Bytes;

use super::wire_format::{
    decode_frame, encode_frame, ErrorCode, PduKind, ReleaseCode, UdcpHeader, NO_DATA,
};
use crate::error::Result;

/// A protocol data unit, request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// Decoded header.
    pub header: UdcpHeader,
    /// Payload bytes.
    pub payload: Bytes,
    /// Request this PDU answers, if any.
    request: Option<Box<Pdu>>,
}

impl Pdu {
    /// Create a PDU from a header and payload.
    pub fn from_parts(header: UdcpHeader, payload: Bytes) -> Self {
        Self {
            header,
            payload,
            request: None,
        }
    }

    /// Create a PDU whose continuation flag follows its kind.
    pub fn new(kind: PduKind, payload: impl Into<Bytes>) -> Self {
        Self::from_parts(UdcpHeader::for_kind(kind), payload.into())
    }

    /// Build a data request from raw client bytes.
    ///
    /// Bytes that are not 7-bit ASCII produce an `ErrorNotAscii` PDU instead.
    pub fn data_request(data: &[u8], more_to_send: bool) -> Self {
        Self::data(data, more_to_send)
    }

    /// Build a data response answering `request`.
    ///
    /// Bytes that are not 7-bit ASCII produce an `ErrorNotAscii` PDU instead.
    pub fn data_response(request: &Pdu, data: &[u8], more_to_send: bool) -> Self {
        Self::data(data, more_to_send).answering(request)
    }

    fn data(data: &[u8], more_to_send: bool) -> Self {
        if !data.is_ascii() {
            return Self::from_parts(
                UdcpHeader::new(PduKind::ErrorNotAscii, false),
                Bytes::from_static(&[ErrorCode::ProtocolError as u8]),
            );
        }
        let kind = if more_to_send {
            PduKind::DataWithContinuation
        } else {
            PduKind::DataLong
        };
        Self::from_parts(
            UdcpHeader::new(kind, more_to_send),
            Bytes::copy_from_slice(data),
        )
    }

    /// A client poll for pending data.
    pub fn receive_ready_request() -> Self {
        Self::from_parts(
            UdcpHeader::new(PduKind::ReceiveReady, false),
            Bytes::from_static(NO_DATA),
        )
    }

    /// The server is ready to receive more from the client.
    pub fn receive_ready_response() -> Self {
        Self::from_parts(
            UdcpHeader::new(PduKind::ReceiveReady, true),
            Bytes::from_static(NO_DATA),
        )
    }

    /// Terminate the dialogue with the given reason.
    pub fn release_dialogue(code: ReleaseCode) -> Self {
        Self::from_parts(
            UdcpHeader::new(PduKind::ReleaseDialogue, false),
            Bytes::copy_from_slice(&[code as u8]),
        )
    }

    /// Terminate the dialogue because the user aborted it.
    pub fn user_abort() -> Self {
        Self::release_dialogue(ReleaseCode::UserAbort)
    }

    /// An Error PDU with the given code.
    pub fn error_response(code: ErrorCode) -> Self {
        Self::from_parts(
            UdcpHeader::new(PduKind::Error, false),
            Bytes::copy_from_slice(&[code as u8]),
        )
    }

    /// The generic protocol Error PDU.
    pub fn protocol_error() -> Self {
        Self::error_response(ErrorCode::ProtocolError)
    }

    /// Attach the request this PDU answers.
    pub fn answering(mut self, request: &Pdu) -> Self {
        // Keep the chain one level deep.
        let mut request = request.clone();
        request.request = None;
        self.request = Some(Box::new(request));
        self
    }

    /// Decode a PDU from wire bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (header, payload) = decode_frame(buf)?;
        Ok(Self::from_parts(header, Bytes::copy_from_slice(payload)))
    }

    /// Encode this PDU to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_frame(self.header.kind, &self.payload)
    }

    /// Get the frame kind.
    #[inline]
    pub fn kind(&self) -> PduKind {
        self.header.kind
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Get the request this PDU answers.
    #[inline]
    pub fn request(&self) -> Option<&Pdu> {
        self.request.as_deref()
    }

    /// Get the protocol version.
    #[inline]
    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Check if more fragments follow.
    #[inline]
    pub fn has_more_to_send(&self) -> bool {
        self.header.more_to_send
    }

    #[inline]
    pub fn is_data_pdu(&self) -> bool {
        self.header.kind.is_data()
    }

    #[inline]
    pub fn is_receive_ready_pdu(&self) -> bool {
        self.header.kind == PduKind::ReceiveReady
    }

    #[inline]
    pub fn is_release_dialogue_pdu(&self) -> bool {
        self.header.kind == PduKind::ReleaseDialogue
    }

    #[inline]
    pub fn is_error_pdu(&self) -> bool {
        matches!(self.header.kind, PduKind::Error | PduKind::ErrorNotAscii)
    }

    /// Decode the error code of an Error PDU.
    pub fn error_code(&self) -> Option<ErrorCode> {
        if !self.is_error_pdu() {
            return None;
        }
        self.payload.first().copied().and_then(ErrorCode::from_u8)
    }

    /// Decode the release code of a ReleaseDialogue PDU.
    pub fn release_code(&self) -> Option<ReleaseCode> {
        if !self.is_release_dialogue_pdu() {
            return None;
        }
        self.payload.first().copied().and_then(ReleaseCode::from_u8)
    }
}

impl std::fmt::Display for Pdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            self.header.kind,
            String::from_utf8_lossy(&self.payload)
        )
    }
}
