//! Outbound segmentation of a send buffer into USSD-sized chunks.
//!
//! A USSD screen carries at most [`MAX_DATA_LENGTH`] bytes of payload, so a
//! longer response is handed out one chunk per turn. The caller keeps the
//! cursor between turns.
//!
//! ```text
//! len = 254:  [0..127) more   [127..254) more   [254..254) done
//! len = 200:  [0..127) more   [127..200) done
//! len = 90:   [0..90)  done
//! ```

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::MAX_DATA_LENGTH;
use crate::session::SessionBuffer;

/// One chunk of a send buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Bytes,
    /// Whether another chunk follows.
    pub more_to_send: bool,
    /// Cursor to pass for the next chunk.
    pub next_cursor: usize,
}

/// Cut the chunk starting at `cursor` out of `buffer`.
///
/// Buffers that fit in one screen are always emitted whole, regardless of
/// the cursor.
///
/// # Errors
///
/// Returns `ReadOutOfBounds` if `cursor` lies past the end of the buffer.
pub fn next_chunk(buffer: &SessionBuffer, cursor: usize) -> Result<Chunk> {
    let len = buffer.len();

    let (offset, mut size, mut more_to_send) = if len <= MAX_DATA_LENGTH {
        (0, len, false)
    } else {
        (cursor, MAX_DATA_LENGTH, true)
    };

    let remaining = len.saturating_sub(offset);
    if remaining < MAX_DATA_LENGTH {
        more_to_send = false;
        size = remaining;
    }

    let mut data = vec![0u8; size];
    buffer.read_at(&mut data, offset)?;

    let next_cursor = if more_to_send && cursor < len {
        cursor + MAX_DATA_LENGTH
    } else {
        cursor
    };

    Ok(Chunk {
        data: Bytes::from(data),
        more_to_send,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UdcpError;
    use crate::session::{MemoryStore, Session};
    use std::sync::Arc;

    fn filled(len: usize) -> Session {
        let mut session = Session::get_or_create("seg", Arc::new(MemoryStore::new())).unwrap();
        let data: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
        session.send_buffer_mut().write(&data).unwrap();
        session
    }

    #[test]
    fn test_short_buffer_single_chunk() {
        let session = filled(90);
        let chunk = next_chunk(session.send_buffer(), 0).unwrap();
        assert_eq!(chunk.data.len(), 90);
        assert!(!chunk.more_to_send);
        assert_eq!(chunk.next_cursor, 0);
    }

    #[test]
    fn test_exactly_one_screen() {
        let session = filled(MAX_DATA_LENGTH);
        let chunk = next_chunk(session.send_buffer(), 0).unwrap();
        assert_eq!(chunk.data.len(), MAX_DATA_LENGTH);
        assert!(!chunk.more_to_send);
    }

    #[test]
    fn test_two_hundred_bytes() {
        let session = filled(200);
        let buffer = session.send_buffer();

        let first = next_chunk(buffer, 0).unwrap();
        assert_eq!(first.data.len(), 127);
        assert!(first.more_to_send);
        assert_eq!(first.next_cursor, 127);

        let second = next_chunk(buffer, first.next_cursor).unwrap();
        assert_eq!(second.data.len(), 73);
        assert!(!second.more_to_send);

        let mut joined = first.data.to_vec();
        joined.extend_from_slice(&second.data);
        assert_eq!(&joined[..], &buffer.read()[..]);
    }

    #[test]
    fn test_exact_multiple_ends_with_empty_chunk() {
        let session = filled(254);
        let buffer = session.send_buffer();

        let first = next_chunk(buffer, 0).unwrap();
        let second = next_chunk(buffer, first.next_cursor).unwrap();
        assert_eq!(second.data.len(), 127);
        assert!(second.more_to_send);
        assert_eq!(second.next_cursor, 254);

        let third = next_chunk(buffer, second.next_cursor).unwrap();
        assert!(third.data.is_empty());
        assert!(!third.more_to_send);
    }

    #[test]
    fn test_empty_buffer() {
        let session = filled(0);
        let chunk = next_chunk(session.send_buffer(), 0).unwrap();
        assert!(chunk.data.is_empty());
        assert!(!chunk.more_to_send);
    }

    #[test]
    fn test_cursor_past_end_is_error() {
        let session = filled(300);
        let err = next_chunk(session.send_buffer(), 400).unwrap_err();
        assert!(matches!(err, UdcpError::ReadOutOfBounds { offset: 400, .. }));
    }
}
