//! Read path: `get()`, `list()`, `len()`, and `fold()`.
//!
//! A lookup consults the keydir for the locator of the key's latest record,
//! reads the full record with one positional read, re-verifies the
//! checksum, and checks expiry before handing the value back.

use datafile::DataFile;
use keydir::Entry;
use record::Record;
use std::io;
use tracing::debug;

use crate::{now, Barrel, Error, Inner, Result};

impl Barrel {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// [`Error::MissingKey`] if the key is absent,
    /// [`Error::ChecksumMismatch`] if the on-disk record fails integrity
    /// verification, [`Error::ExpiredKey`] if the record is past its expiry
    /// (the entry is dropped from the keydir in that case).
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }

        if self.opts.debug {
            debug!(key, "fetching data");
        }

        let entry = *inner.keydir.get(key).ok_or(Error::MissingKey)?;
        let record = inner.read_record(key, &entry)?;

        if record.is_expired(now()) {
            // Expired entries must not survive a lookup; the record itself
            // is reclaimed by compaction.
            inner.keydir.delete(key);
            return Err(Error::ExpiredKey);
        }

        Ok(record.value)
    }

    /// Returns a snapshot of all live keys. No ordering guarantees.
    pub fn list(&self) -> Vec<String> {
        let inner = self.lock();
        inner.keydir.keys().cloned().collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.lock().keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` for every live key. Iteration stops at the first error,
    /// which is propagated to the caller.
    ///
    /// The engine lock is held for the duration, so `f` must not call back
    /// into the engine.
    pub fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let inner = self.lock();
        for key in inner.keydir.keys() {
            f(key)?;
        }
        Ok(())
    }
}

impl Inner {
    /// Reads and decodes the record a keydir entry points at. The record
    /// start is reconstructed from the value offset and the key length.
    pub(crate) fn read_record(&self, key: &str, entry: &Entry) -> Result<Record> {
        let record_offset = entry.value_offset - record::value_offset(key.len()) as u64;
        let file = self.file_by_id(entry.file_id)?;
        let bytes = file.read_at(record_offset, entry.record_size as usize)?;
        Ok(record::decode(&bytes)?)
    }

    /// Resolves a file id against the active file and the stale map.
    pub(crate) fn file_by_id(&self, id: u32) -> Result<&DataFile> {
        if let Some(active) = self.active.as_ref() {
            if active.id() == id {
                return Ok(active);
            }
        }
        self.stale.get(&id).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("data file {} is not open", id),
            ))
        })
    }
}
