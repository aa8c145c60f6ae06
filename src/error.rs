//! Error types for udcp-server.

use thiserror::Error;

use crate::protocol::{ErrorCode, Pdu, ReleaseCode};

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing the backing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted session record could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store's internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Errors raised while loading a [`GatewayConfig`](crate::GatewayConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for all UDCP operations.
#[derive(Debug, Error)]
pub enum UdcpError {
    /// The frame header could not be parsed.
    #[error("failed to parse UDCP header: {0}")]
    InvalidHeader(String),

    /// The header carried a protocol version other than 1.
    #[error("version {0} not supported, only version 1 is supported")]
    UnsupportedVersion(u8),

    /// A request flagged as "more to send" also carried a conflicting payload.
    #[error("request with more-to-send flag was sent with data")]
    MoreToSendWithData,

    /// The declared payload length does not match the bytes available.
    #[error("declared length {declared} inconsistent with {actual} payload bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload exceeds what the frame or session buffer can hold.
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// A session buffer or record could not be persisted.
    #[error("failed to save session in session store: {0}")]
    SessionPersist(#[from] StoreError),

    /// The subscriber address (phone number or session id) is invalid.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The inbound request could not be turned into a PDU.
    #[error("failed to parse USSD request")]
    UnknownParse,

    /// An aggregator callback body could not be decoded.
    #[error("malformed callback body: {0}")]
    MalformedBody(String),

    /// A response could not be rendered into an aggregator body.
    #[error("failed to render response: {0}")]
    Render(String),

    /// A partial read asked for bytes beyond the end of a session buffer.
    #[error("read of {requested} bytes at offset {offset} exceeds buffer length {available}")]
    ReadOutOfBounds {
        offset: usize,
        requested: usize,
        available: usize,
    },

    /// The application did not provide a session for the turn.
    #[error("session is missing or not configured")]
    SessionNotConfigured,

    /// A multiplexer was built without any candidate application.
    #[error("multiplexing application requires at least one application")]
    NoApplications,

    /// An application handler failed.
    #[error("application error: {0}")]
    Application(String),

    /// The turn did not complete within the configured deadline.
    #[error("request timed out")]
    Timeout,

    /// The gateway configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl UdcpError {
    /// Protocol error code reported to the client for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion(_) => ErrorCode::VersionError,
            Self::InvalidAddress(_) => ErrorCode::ExtendedAddressError,
            Self::InvalidHeader(_)
            | Self::MoreToSendWithData
            | Self::LengthMismatch { .. }
            | Self::PayloadTooLarge { .. }
            | Self::UnknownParse
            | Self::MalformedBody(_)
            | Self::SessionNotConfigured => ErrorCode::ProtocolError,
            Self::SessionPersist(_)
            | Self::ReadOutOfBounds { .. }
            | Self::NoApplications
            | Self::Application(_)
            | Self::Render(_)
            | Self::Timeout
            | Self::Config(_) => ErrorCode::Unknown,
        }
    }

    /// Build the PDU that reports this error to the client.
    ///
    /// A timeout ends the dialogue rather than faulting it, so it maps to a
    /// ReleaseDialogue PDU; every other error maps to an Error PDU.
    pub fn to_pdu(&self) -> Pdu {
        match self {
            Self::Timeout => Pdu::release_dialogue(ReleaseCode::UssdTimeout),
            other => Pdu::error_response(other.error_code()),
        }
    }
}

/// Result type alias using UdcpError.
pub type Result<T> = std::result::Result<T, UdcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_code() {
        let err = UdcpError::UnsupportedVersion(2);
        assert_eq!(err.error_code(), ErrorCode::VersionError);

        let pdu = err.to_pdu();
        assert!(pdu.is_error_pdu());
        assert_eq!(pdu.error_code(), Some(ErrorCode::VersionError));
    }

    #[test]
    fn test_parse_errors_map_to_protocol_error() {
        for err in [
            UdcpError::UnknownParse,
            UdcpError::MalformedBody("<ussd".into()),
            UdcpError::InvalidHeader("bad".into()),
            UdcpError::LengthMismatch {
                declared: 4,
                actual: 2,
            },
        ] {
            assert_eq!(err.error_code(), ErrorCode::ProtocolError);
        }
    }

    #[test]
    fn test_timeout_releases_dialogue() {
        let pdu = UdcpError::Timeout.to_pdu();
        assert!(pdu.is_release_dialogue_pdu());
        assert_eq!(pdu.release_code(), Some(ReleaseCode::UssdTimeout));
    }

    #[test]
    fn test_store_error_wraps_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: UdcpError = StoreError::from(io).into();
        assert!(matches!(err, UdcpError::SessionPersist(StoreError::Io(_))));
        assert!(err.to_string().contains("disk full"));
    }
}
