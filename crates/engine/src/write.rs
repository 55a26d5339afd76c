//! Write path: `put()`, `put_ex()`, `delete()`, and `sync()`.
//!
//! Every mutation encodes a record, appends it to the active data file, and
//! updates the keydir under the engine lock. Deletes append a tombstone
//! (zero-length value) and drop the key from the keydir; the on-disk
//! tombstone lingers until compaction rewrites the file set.

use keydir::Entry;
use std::time::Duration;
use tracing::debug;

use crate::{now, Barrel, Error, Inner, Result, MAX_KEY_SIZE};

impl Barrel {
    /// Stores `value` under `key`. The record never expires.
    ///
    /// With `auto_sync` enabled the active file is fsynced before the call
    /// returns.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put_with_expiry(key, value, None)
    }

    /// Stores `value` under `key` with a time-to-live. The expiry is stored
    /// as an absolute instant (`now + ttl`); once reached, `get` reports
    /// [`Error::ExpiredKey`] and compaction prunes the record.
    pub fn put_ex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.put_with_expiry(key, value, Some(ttl))
    }

    fn put_with_expiry(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if self.opts.read_only {
            return Err(Error::ReadOnly);
        }
        self.validate_key(key)?;
        self.validate_value(key, value)?;

        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }

        // Taken under the lock so append order and timestamp order agree.
        let timestamp = now();
        let expiry = match ttl {
            Some(ttl) => timestamp.saturating_add(ttl.as_secs().min(u32::MAX as u64) as u32),
            None => 0,
        };

        if self.opts.debug {
            debug!(key, len = value.len(), expiry, "storing data");
        }

        let entry = inner.append_record(key, value, timestamp, expiry, self.opts.auto_sync)?;
        inner.keydir.set(key.to_string(), entry);
        Ok(())
    }

    /// Deletes `key` by appending a tombstone record and dropping the key
    /// from the keydir. The key's older records remain on disk until
    /// compaction.
    pub fn delete(&self, key: &str) -> Result<()> {
        if self.opts.read_only {
            return Err(Error::ReadOnly);
        }
        self.validate_key(key)?;

        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }

        if self.opts.debug {
            debug!(key, "deleting key");
        }

        inner.append_record(key, b"", now(), 0, self.opts.auto_sync)?;
        inner.keydir.delete(key);
        Ok(())
    }

    /// fsyncs the active data file.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }
        if let Some(active) = inner.active.as_mut() {
            active.sync()?;
        }
        Ok(())
    }

    fn validate_key(&self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidKey("key must not be empty"));
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::InvalidKey("key exceeds the maximum key size"));
        }
        Ok(())
    }

    fn validate_value(&self, key: &str, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidValue(
                "empty values are reserved for tombstones",
            ));
        }
        // A record that can never fit in a data file is rejected up front;
        // rotation only bounds where the next file starts.
        if record::encoded_size(key.len(), value.len()) as u64 > self.opts.file_size_limit {
            return Err(Error::InvalidValue(
                "record exceeds the configured file size limit",
            ));
        }
        Ok(())
    }
}

impl Inner {
    /// Encodes one record, appends it to the active file, and returns the
    /// keydir locator for it. Reuses the shared encode buffer.
    pub(crate) fn append_record(
        &mut self,
        key: &str,
        value: &[u8],
        timestamp: u32,
        expiry: u32,
        auto_sync: bool,
    ) -> Result<Entry> {
        let mut buf = std::mem::take(&mut self.encode_buf);
        let result = (|| -> Result<Entry> {
            let value_off = record::encode_into(&mut buf, key, value, timestamp, expiry)?;

            let active = self.active_mut()?;
            let offset = active.append(&buf)?;
            if auto_sync {
                active.sync()?;
            }

            Ok(Entry {
                file_id: active.id(),
                record_size: buf.len() as u32,
                value_offset: offset + value_off as u64,
                timestamp,
            })
        })();
        self.encode_buf = buf;
        result
    }
}
