//! Frame buffer for accumulating partial reads.
//!
//! Some transports hand over several UDCP frames in one body, or split a
//! frame across reads. `FrameBuffer` keeps the leftovers and yields every
//! complete PDU:
//! - `WaitingForPrefix`: need the 4-byte tag/length/separator prefix
//! - `WaitingForPayload`: prefix parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use udcp_server::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//! assert!(buffer.push(b"D;\x05\x00HE").unwrap().is_empty());
//!
//! let pdus = buffer.push(b"LLOR;\x00\x00").unwrap();
//! assert_eq!(pdus.len(), 2);
//! assert_eq!(pdus[0].payload(), b"HELLO");
//! assert!(pdus[1].is_receive_ready_pdu());
//! ```

use bytes::BytesMut;

use super::wire_format::{decode_prefix, UdcpHeader, PREFIX_SIZE};
use super::Pdu;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    WaitingForPrefix,
    WaitingForPayload { header: UdcpHeader, remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete PDUs.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
}

impl FrameBuffer {
    /// Create an empty frame buffer.
    pub fn new() -> Self {
        Self {
            // Two maximum-size frames.
            buffer: BytesMut::with_capacity(2 * (PREFIX_SIZE + u8::MAX as usize)),
            state: State::WaitingForPrefix,
        }
    }

    /// Push data into the buffer and extract all complete PDUs.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame prefix is malformed (bad separator). The
    /// buffer is cleared in that case since there is no way to resynchronise.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Pdu>> {
        self.buffer.extend_from_slice(data);

        let mut pdus = Vec::new();
        loop {
            match self.try_extract_one() {
                Ok(Some(pdu)) => pdus.push(pdu),
                Ok(None) => return Ok(pdus),
                Err(e) => {
                    self.clear();
                    return Err(e);
                }
            }
        }
    }

    fn try_extract_one(&mut self) -> Result<Option<Pdu>> {
        match &self.state {
            State::WaitingForPrefix => {
                if self.buffer.len() < PREFIX_SIZE {
                    return Ok(None);
                }

                let (header, declared) = decode_prefix(&self.buffer[..PREFIX_SIZE])?;
                let _ = self.buffer.split_to(PREFIX_SIZE);

                self.state = State::WaitingForPayload {
                    header,
                    remaining: declared,
                };
                self.try_extract_one()
            }

            State::WaitingForPayload { header, remaining } => {
                let remaining = *remaining;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let payload = self.buffer.split_to(remaining).freeze();
                let header = *header;
                self.state = State::WaitingForPrefix;

                Ok(Some(Pdu::from_parts(header, payload)))
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if bytes of an incomplete frame are pending, including a parsed
    /// prefix still waiting for its payload.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForPayload { .. })
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
