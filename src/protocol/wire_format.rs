//! Wire format encoding and decoding.
//!
//! Every UDCP frame is a 2-character ASCII tag, a single length byte, a
//! `0x00` separator and the payload:
//! ```text
//! ┌──────────┬────────┬───────────┬───────────────┐
//! │ Tag      │ Length │ Separator │ Payload       │
//! │ 2 bytes  │ 1 byte │ 0x00      │ Length bytes  │
//! │ ASCII    │ uint8  │           │               │
//! └──────────┴────────┴───────────┴───────────────┘
//! ```
//!
//! There is no checksum, no multi-byte length and no terminator.

use crate::error::{Result, UdcpError};

/// Frame prefix size in bytes (tag + length + separator).
pub const PREFIX_SIZE: usize = 4;

/// Size of the ASCII tag at the start of every frame.
pub const TAG_SIZE: usize = 2;

/// Byte separating the length from the payload.
pub const SEPARATOR: u8 = 0x00;

/// The only protocol version this engine speaks.
pub const PROTOCOL_VERSION: u8 = 0x1;

/// Largest payload a single data frame carries.
pub const MAX_DATA_LENGTH: usize = 127;

/// Largest logical USSD text. Networks allow up to 160 octets but the
/// limit is configurable per network, so 140 is used.
pub const MAX_USSD_LENGTH: usize = 140;

/// Largest payload the single length byte can describe.
pub const MAX_FRAME_PAYLOAD: usize = u8::MAX as usize;

/// Payload of ReceiveReady frames that carry nothing.
pub const NO_DATA: &[u8] = b"__NODATA__";

/// Frame type of a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduKind {
    Application,
    Command,
    CommandWithContinuation,
    DataLong,
    DataWithContinuation,
    ReceiveReady,
    Error,
    /// Payload failed ASCII validation. Never seen on the wire.
    ErrorNotAscii,
    Query,
    QueryWithContinuation,
    Protocol,
    ReleaseDialogue,
    /// Tag did not match any known kind.
    Invalid,
}

impl PduKind {
    /// Every kind that has its own wire tag.
    pub const TAGGED: [PduKind; 11] = [
        PduKind::Application,
        PduKind::Command,
        PduKind::CommandWithContinuation,
        PduKind::DataLong,
        PduKind::DataWithContinuation,
        PduKind::ReceiveReady,
        PduKind::Error,
        PduKind::Query,
        PduKind::QueryWithContinuation,
        PduKind::Protocol,
        PduKind::ReleaseDialogue,
    ];

    /// Resolve a wire tag. Matching is exact and case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// use udcp_server::protocol::PduKind;
    ///
    /// assert_eq!(PduKind::from_tag("d;"), PduKind::DataWithContinuation);
    /// assert_eq!(PduKind::from_tag("D;"), PduKind::DataLong);
    /// assert_eq!(PduKind::from_tag("DX;"), PduKind::Invalid);
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "A;" => Self::Application,
            "C;" => Self::Command,
            "c;" => Self::CommandWithContinuation,
            "D;" => Self::DataLong,
            "d;" => Self::DataWithContinuation,
            "R;" => Self::ReceiveReady,
            "E;" => Self::Error,
            "Q;" => Self::Query,
            "q;" => Self::QueryWithContinuation,
            "U;" => Self::Protocol,
            "X;" => Self::ReleaseDialogue,
            _ => Self::Invalid,
        }
    }

    /// Wire tag of this kind.
    ///
    /// Kinds without a tag of their own encode as `E;` so the encoder never
    /// emits an empty tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Application => "A;",
            Self::Command => "C;",
            Self::CommandWithContinuation => "c;",
            Self::DataLong => "D;",
            Self::DataWithContinuation => "d;",
            Self::ReceiveReady => "R;",
            Self::Query => "Q;",
            Self::QueryWithContinuation => "q;",
            Self::Protocol => "U;",
            Self::ReleaseDialogue => "X;",
            Self::Error | Self::ErrorNotAscii | Self::Invalid => "E;",
        }
    }

    /// Numeric tag of this kind.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Application => 0x41,
            Self::Command => 0x43,
            Self::CommandWithContinuation => 0x63,
            Self::DataLong => 0x44,
            Self::DataWithContinuation => 0x64,
            Self::ReceiveReady => 0x52,
            Self::Error => 0x45,
            Self::ErrorNotAscii => 0x46,
            Self::Query => 0x51,
            Self::QueryWithContinuation => 0x71,
            Self::Protocol => 0x55,
            Self::ReleaseDialogue => 0x58,
            Self::Invalid => 0x99,
        }
    }

    /// Resolve a numeric tag; unknown values are `Invalid`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x41 => Self::Application,
            0x43 => Self::Command,
            0x63 => Self::CommandWithContinuation,
            0x44 => Self::DataLong,
            0x64 => Self::DataWithContinuation,
            0x52 => Self::ReceiveReady,
            0x45 => Self::Error,
            0x46 => Self::ErrorNotAscii,
            0x51 => Self::Query,
            0x71 => Self::QueryWithContinuation,
            0x55 => Self::Protocol,
            0x58 => Self::ReleaseDialogue,
            _ => Self::Invalid,
        }
    }

    /// Whether frames of this kind announce that more fragments follow.
    ///
    /// Only the "with continuation" kinds do; `DataLong` is a complete frame.
    #[inline]
    pub fn has_more_to_send(self) -> bool {
        matches!(
            self,
            Self::CommandWithContinuation | Self::DataWithContinuation | Self::QueryWithContinuation
        )
    }

    /// Whether this is one of the two data kinds.
    #[inline]
    pub fn is_data(self) -> bool {
        matches!(self, Self::DataLong | Self::DataWithContinuation)
    }
}

impl std::fmt::Display for PduKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error codes carried as the single payload byte of an Error PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Unknown = 0x66,
    ProtocolError = 0x67,
    VersionError = 0x68,
    ExtendedAddressError = 0x69,
}

impl ErrorCode {
    /// Decode a code byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x66 => Some(Self::Unknown),
            0x67 => Some(Self::ProtocolError),
            0x68 => Some(Self::VersionError),
            0x69 => Some(Self::ExtendedAddressError),
            _ => None,
        }
    }
}

/// Release codes carried as the single payload byte of a ReleaseDialogue PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReleaseCode {
    UserAbort = 0x74,
    IdleDialogue = 0x75,
    UssdTimeout = 0x76,
    Unknown = 0x77,
}

impl ReleaseCode {
    /// Decode a code byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x74 => Some(Self::UserAbort),
            0x75 => Some(Self::IdleDialogue),
            0x76 => Some(Self::UssdTimeout),
            0x77 => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Decoded header of a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdcpHeader {
    /// Frame type.
    pub kind: PduKind,
    /// Protocol version (always [`PROTOCOL_VERSION`] on frames we build).
    pub version: u8,
    /// More fragments follow in the same direction.
    pub more_to_send: bool,
}

impl UdcpHeader {
    /// Create a header for the current protocol version.
    pub fn new(kind: PduKind, more_to_send: bool) -> Self {
        Self {
            kind,
            version: PROTOCOL_VERSION,
            more_to_send,
        }
    }

    /// Create a header whose continuation flag follows the kind.
    pub fn for_kind(kind: PduKind) -> Self {
        Self::new(kind, kind.has_more_to_send())
    }

    /// Check the header for protocol compliance.
    pub fn validate(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(UdcpError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Encode a frame into a byte vector.
///
/// # Example
///
/// ```
/// use udcp_server::protocol::{encode_frame, PduKind};
///
/// let bytes = encode_frame(PduKind::DataLong, b"HI").unwrap();
/// assert_eq!(bytes, b"D;\x02\x00HI");
/// ```
pub fn encode_frame(kind: PduKind, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(UdcpError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_FRAME_PAYLOAD,
        });
    }
    let mut buf = Vec::with_capacity(PREFIX_SIZE + payload.len());
    buf.extend_from_slice(kind.tag().as_bytes());
    buf.push(payload.len() as u8);
    buf.push(SEPARATOR);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode the 4-byte frame prefix into a header and the declared length.
///
/// An unknown tag yields an `Invalid` kind, not an error; the caller decides
/// what to do with it.
pub fn decode_prefix(buf: &[u8]) -> Result<(UdcpHeader, usize)> {
    if buf.len() < PREFIX_SIZE {
        return Err(UdcpError::InvalidHeader(format!(
            "frame needs at least {} bytes, got {}",
            PREFIX_SIZE,
            buf.len()
        )));
    }
    let kind = match std::str::from_utf8(&buf[..TAG_SIZE]) {
        Ok(tag) => PduKind::from_tag(tag),
        Err(_) => PduKind::Invalid,
    };
    if buf[3] != SEPARATOR {
        return Err(UdcpError::InvalidHeader(format!(
            "expected separator 0x00, got {:#04x}",
            buf[3]
        )));
    }
    Ok((UdcpHeader::for_kind(kind), buf[2] as usize))
}

/// Decode a complete frame, returning its header and payload slice.
///
/// Trailing bytes after the declared payload are ignored.
pub fn decode_frame(buf: &[u8]) -> Result<(UdcpHeader, &[u8])> {
    let (header, declared) = decode_prefix(buf)?;
    let available = buf.len() - PREFIX_SIZE;
    if available < declared {
        return Err(UdcpError::LengthMismatch {
            declared,
            actual: available,
        });
    }
    Ok((header, &buf[PREFIX_SIZE..PREFIX_SIZE + declared]))
}
