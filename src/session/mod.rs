//! Sessions - per-dialogue receive/send staging with persistence.
//!
//! A [`Session`] is identified by the id the USSD network assigns to the
//! dialogue. It owns two [`SessionBuffer`]s, a `committed` flag and the
//! outbound segmentation cursor, all persisted through a shared
//! [`SessionStore`]:
//!
//! ```text
//! udcp:rec:<id>         {"committed": bool, "cursor": usize}
//! udcp:recv:<id>        inbound bytes of the current turn
//! udcp:recv-prev:<id>   recv contents at the last reset
//! udcp:send:<id>        outbound bytes of the current turn
//! udcp:send-prev:<id>   send contents at the last reset
//! ```
//!
//! Every key kind has its own prefix and the id comes last, so no id can
//! produce another session's key.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use udcp_server::session::{MemoryStore, Session};
//!
//! let store = Arc::new(MemoryStore::new());
//! let mut session = Session::get_or_create("abc", store.clone()).unwrap();
//! session.recv_buffer_mut().write(b"HELLO").unwrap();
//!
//! let again = Session::get_or_create("abc", store).unwrap();
//! assert_eq!(&again.recv_buffer().read()[..], b"HELLO");
//! ```

mod buffer;
mod store;

pub use buffer::SessionBuffer;
pub use store::{FileStore, MemoryStore, SessionStore};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Session shared between the gateway, the application and the engine.
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

const KEY_PREFIX: &str = "udcp";

/// Store keys of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub record: Vec<u8>,
    pub recv: Vec<u8>,
    pub send: Vec<u8>,
    pub recv_prev: Vec<u8>,
    pub send_prev: Vec<u8>,
}

impl SessionKeys {
    /// Keys for the session `id`.
    pub fn for_session(id: &str) -> Self {
        Self {
            record: key("rec", id),
            recv: key("recv", id),
            send: key("send", id),
            recv_prev: key("recv-prev", id),
            send_prev: key("send-prev", id),
        }
    }
}

fn key(kind: &str, id: &str) -> Vec<u8> {
    format!("{KEY_PREFIX}:{kind}:{id}").into_bytes()
}

/// Persisted part of a session besides its buffers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default)]
    committed: bool,
    /// Offset of the next outbound chunk in the send buffer.
    #[serde(default)]
    cursor: usize,
}

/// One USSD dialogue's staging area.
pub struct Session {
    id: String,
    recv: SessionBuffer,
    send: SessionBuffer,
    record: SessionRecord,
    record_key: Vec<u8>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Load the session `id` from `store`, creating it if absent.
    ///
    /// A new session persists an empty record and starts with empty buffers.
    /// An existing one is hydrated from its record and buffer keys.
    pub fn get_or_create(id: &str, store: Arc<dyn SessionStore>) -> Result<Self> {
        let keys = SessionKeys::for_session(id);
        let record: SessionRecord = match store.get(&keys.record)? {
            Some(raw) => serde_json::from_slice(&raw).map_err(StoreError::from)?,
            None => {
                let record = SessionRecord::default();
                store.put(&keys.record, &serde_json::to_vec(&record).map_err(StoreError::from)?)?;
                record
            }
        };

        let recv_data = store.get(&keys.recv)?.unwrap_or_default();
        let send_data = store.get(&keys.send)?.unwrap_or_default();

        tracing::debug!(
            session_id = id,
            committed = record.committed,
            cursor = record.cursor,
            recv = recv_data.len(),
            send = send_data.len(),
            "session loaded"
        );

        Ok(Self {
            id: id.to_string(),
            recv: SessionBuffer::new(keys.recv, keys.recv_prev, &recv_data, store.clone()),
            send: SessionBuffer::new(keys.send, keys.send_prev, &send_data, store.clone()),
            record,
            record_key: keys.record,
            store,
        })
    }

    /// Wrap this session for sharing across tasks.
    pub fn into_shared(self) -> SharedSession {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Get the session id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn recv_buffer(&self) -> &SessionBuffer {
        &self.recv
    }

    #[inline]
    pub fn recv_buffer_mut(&mut self) -> &mut SessionBuffer {
        &mut self.recv
    }

    #[inline]
    pub fn send_buffer(&self) -> &SessionBuffer {
        &self.send
    }

    #[inline]
    pub fn send_buffer_mut(&mut self) -> &mut SessionBuffer {
        &mut self.send
    }

    /// Mutable access to both buffers at once.
    pub fn buffers_mut(&mut self) -> (&mut SessionBuffer, &mut SessionBuffer) {
        (&mut self.recv, &mut self.send)
    }

    /// Check if the session is still collecting inbound data.
    pub fn is_open(&self) -> bool {
        !self.record.committed
    }

    /// Check if the inbound phase of the turn is complete.
    pub fn is_committed(&self) -> bool {
        self.record.committed
    }

    /// Mark the inbound phase complete.
    pub fn commit(&mut self) -> Result<()> {
        self.persist_record(SessionRecord {
            committed: true,
            ..self.record
        })
    }

    /// Offset of the next outbound chunk in the send buffer.
    pub fn send_cursor(&self) -> usize {
        self.record.cursor
    }

    /// Persist the offset of the next outbound chunk.
    pub fn set_send_cursor(&mut self, cursor: usize) -> Result<()> {
        self.persist_record(SessionRecord {
            cursor,
            ..self.record
        })
    }

    /// Close the session. Equivalent to a final commit.
    pub fn close(&mut self) -> Result<()> {
        self.commit()
    }

    /// Purge both buffers, clear the committed flag and rewind the cursor.
    ///
    /// The session id stays valid and the session accepts new writes.
    pub fn reset(&mut self) -> Result<()> {
        self.recv.purge()?;
        self.send.purge()?;
        self.persist_record(SessionRecord::default())?;
        tracing::debug!(session_id = %self.id, "session reset");
        Ok(())
    }

    fn persist_record(&mut self, record: SessionRecord) -> Result<()> {
        let raw = serde_json::to_vec(&record).map_err(StoreError::from)?;
        self.store.put(&self.record_key, &raw)?;
        self.record = record;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("committed", &self.record.committed)
            .field("cursor", &self.record.cursor)
            .field("recv", &self.recv)
            .field("send", &self.send)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_new_session_persists_record() {
        let store = store();
        let session = Session::get_or_create("s1", store.clone()).unwrap();

        assert_eq!(session.id(), "s1");
        assert!(session.is_open());
        assert!(session.recv_buffer().is_empty());
        assert!(session.send_buffer().is_empty());

        let raw = store.get(b"udcp:rec:s1").unwrap().unwrap();
        let record: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(record["committed"], false);
        assert_eq!(record["cursor"], 0);
    }

    #[test]
    fn test_rehydrates_buffers_and_commit() {
        let store = store();
        {
            let mut session = Session::get_or_create("s1", store.clone()).unwrap();
            session.recv_buffer_mut().write(b"in").unwrap();
            session.send_buffer_mut().write(b"out").unwrap();
            session.commit().unwrap();
        }

        let session = Session::get_or_create("s1", store).unwrap();
        assert_eq!(&session.recv_buffer().read()[..], b"in");
        assert_eq!(&session.send_buffer().read()[..], b"out");
        assert!(session.is_committed());
        assert!(!session.is_open());
    }

    #[test]
    fn test_reset_empties_and_archives() {
        let store = store();
        let mut session = Session::get_or_create("s1", store.clone()).unwrap();
        session.recv_buffer_mut().write(b"question").unwrap();
        session.send_buffer_mut().write(b"answer").unwrap();
        session.commit().unwrap();

        session.reset().unwrap();

        assert!(session.recv_buffer().is_empty());
        assert!(session.send_buffer().is_empty());
        assert!(session.is_open());
        assert_eq!(
            store.get(b"udcp:recv-prev:s1").unwrap(),
            Some(b"question".to_vec())
        );
        assert_eq!(
            store.get(b"udcp:send-prev:s1").unwrap(),
            Some(b"answer".to_vec())
        );
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut session = Session::get_or_create("s1", store()).unwrap();
        session.recv_buffer_mut().write(b"x").unwrap();

        session.reset().unwrap();
        session.reset().unwrap();

        assert!(session.recv_buffer().is_empty());
        session.recv_buffer_mut().write(b"next turn").unwrap();
        assert_eq!(&session.recv_buffer().read()[..], b"next turn");
    }

    #[test]
    fn test_sessions_do_not_collide() {
        let store = store();
        let mut a = Session::get_or_create("a", store.clone()).unwrap();
        let mut b = Session::get_or_create("b", store.clone()).unwrap();

        a.recv_buffer_mut().write(b"from a").unwrap();
        b.recv_buffer_mut().write(b"from b").unwrap();
        a.reset().unwrap();

        let b = Session::get_or_create("b", store).unwrap();
        assert_eq!(&b.recv_buffer().read()[..], b"from b");
    }

    #[test]
    fn test_ids_with_separators_do_not_collide() {
        let store = store();
        let mut outer = Session::get_or_create("x", store.clone()).unwrap();
        let mut slash = Session::get_or_create("x/recv", store.clone()).unwrap();
        let mut colon = Session::get_or_create("x:recv", store.clone()).unwrap();

        outer.recv_buffer_mut().write(b"HELLO").unwrap();
        slash.commit().unwrap();
        slash.recv_buffer_mut().write(b"other").unwrap();
        colon.send_buffer_mut().write(b"third").unwrap();
        colon.reset().unwrap();

        let outer = Session::get_or_create("x", store.clone()).unwrap();
        assert_eq!(&outer.recv_buffer().read()[..], b"HELLO");
        assert!(outer.is_open());
        let slash = Session::get_or_create("x/recv", store).unwrap();
        assert_eq!(&slash.recv_buffer().read()[..], b"other");
        assert!(slash.is_committed());
    }

    #[test]
    fn test_key_kinds_are_distinct() {
        let keys = SessionKeys::for_session("a/b");
        let all = [
            &keys.record,
            &keys.recv,
            &keys.send,
            &keys.recv_prev,
            &keys.send_prev,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(keys.recv, b"udcp:recv:a/b");
    }

    #[test]
    fn test_cursor_persists_and_resets() {
        let store = store();
        {
            let mut session = Session::get_or_create("s1", store.clone()).unwrap();
            session.commit().unwrap();
            session.set_send_cursor(127).unwrap();
        }

        let mut session = Session::get_or_create("s1", store.clone()).unwrap();
        assert_eq!(session.send_cursor(), 127);
        assert!(session.is_committed());

        session.reset().unwrap();
        assert_eq!(session.send_cursor(), 0);
        let session = Session::get_or_create("s1", store).unwrap();
        assert_eq!(session.send_cursor(), 0);
        assert!(session.is_open());
    }

    #[test]
    fn test_close_is_terminal_commit() {
        let mut session = Session::get_or_create("s1", store()).unwrap();
        session.close().unwrap();
        assert!(session.is_committed());
    }

    #[test]
    fn test_corrupt_record_is_persist_error() {
        let store = store();
        store.put(b"udcp:rec:bad", b"not json").unwrap();

        let err = Session::get_or_create("bad", store).unwrap_err();
        assert!(matches!(
            err,
            crate::error::UdcpError::SessionPersist(StoreError::Json(_))
        ));
    }
}
