//! Protocol module - PDU kinds, wire format and framing.
//!
//! This module implements the UDCP framing protocol:
//! - 2-character ASCII tags mapped to [`PduKind`]
//! - tag/length/separator/payload encoding and decoding
//! - [`Pdu`] with typed constructors and predicates
//! - [`FrameBuffer`] for accumulating partial reads

mod frame_buffer;
mod pdu;
mod wire_format;

pub use frame_buffer::FrameBuffer;
pub use pdu::Pdu;
pub use wire_format::{
    decode_frame, decode_prefix, encode_frame, ErrorCode, PduKind, ReleaseCode, UdcpHeader,
    MAX_DATA_LENGTH, MAX_FRAME_PAYLOAD, MAX_USSD_LENGTH, NO_DATA, PREFIX_SIZE, PROTOCOL_VERSION,
    SEPARATOR, TAG_SIZE,
};
