//! Persisted, appendable byte buffer.
//!
//! Every mutation is written through to the [`SessionStore`] before the call
//! returns. If the store rejects the write, the in-memory contents are rolled
//! back so the buffer never claims bytes the store does not hold.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::store::SessionStore;
use crate::error::{Result, UdcpError};

/// One direction (receive or send) of a session's staging area.
pub struct SessionBuffer {
    key: Vec<u8>,
    archive_key: Vec<u8>,
    data: BytesMut,
    store: Arc<dyn SessionStore>,
}

impl SessionBuffer {
    /// Create a buffer stored under `key`, hydrated with `initial`.
    ///
    /// Purged contents are archived under `archive_key`.
    pub(crate) fn new(
        key: Vec<u8>,
        archive_key: Vec<u8>,
        initial: &[u8],
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            key,
            archive_key,
            data: BytesMut::from(initial),
            store,
        }
    }

    /// Full contents of the buffer.
    pub fn read(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }

    /// Fill `dest` with the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ReadOutOfBounds` if fewer than `dest.len()` bytes are
    /// available from `offset`. Callers size `dest` to what remains.
    pub fn read_at(&self, dest: &mut [u8], offset: usize) -> Result<usize> {
        let end = offset
            .checked_add(dest.len())
            .filter(|end| *end <= self.data.len())
            .ok_or(UdcpError::ReadOutOfBounds {
                offset,
                requested: dest.len(),
                available: self.data.len(),
            })?;
        dest.copy_from_slice(&self.data[offset..end]);
        Ok(dest.len())
    }

    /// Append `bytes` and persist.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let previous_len = self.data.len();
        self.data.extend_from_slice(bytes);
        if let Err(e) = self.store.put(&self.key, &self.data) {
            self.data.truncate(previous_len);
            return Err(e.into());
        }
        Ok(())
    }

    /// Replace the contents with `bytes` and persist.
    pub fn set(&mut self, bytes: &[u8]) -> Result<()> {
        self.store.put(&self.key, bytes)?;
        self.data.clear();
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Replace the contents with a copy of `other`.
    pub fn fill_with(&mut self, other: &SessionBuffer) -> Result<()> {
        let contents = other.read();
        self.set(&contents)
    }

    /// Archive the current contents under the previous-contents key, then
    /// clear the buffer.
    pub fn purge(&mut self) -> Result<()> {
        self.store.put(&self.archive_key, &self.data)?;
        self.store.put(&self.key, &[])?;
        self.data.clear();
        Ok(())
    }

    /// Check if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Key the live contents are stored under.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Key purged contents are archived under.
    pub fn archive_key(&self) -> &[u8] {
        &self.archive_key
    }
}

impl std::fmt::Debug for SessionBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuffer")
            .field("key", &String::from_utf8_lossy(&self.key))
            .field("len", &self.data.len())
            .finish()
    }
}
