//! # KeyDir — in-memory index of live keys
//!
//! Maps every live key to the location of its latest record on disk. A
//! lookup costs one hash probe plus one disk seek; the engine keeps the
//! keydir current on every write, so the referenced location is always the
//! newest record for that key.
//!
//! The keydir can be snapshotted to a *hints file* and restored from one,
//! which lets a restart skip the full data-file scan.
//!
//! ## Hints File Format
//!
//! Concatenated tuples, little-endian, one per live key:
//!
//! ```text
//! [file_id: u32][record_size: u32][value_offset: u64][timestamp: u32]
//! [key_size: u32][key bytes]
//! ```
//!
//! Decoding stops cleanly at EOF on a tuple boundary; EOF in the middle of a
//! tuple is corruption.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Safety cap on key sizes while decoding hints; matches the codec's key
/// ceiling.
const MAX_HINT_KEY_SIZE: u32 = 64 * 1024;

/// Errors produced while encoding or decoding a hints snapshot.
#[derive(Debug, Error)]
pub enum HintsError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The hints stream ended mid-tuple or contained an invalid entry.
    #[error("corrupt hints file")]
    Corrupt,
}

/// Locator for the latest on-disk record of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Id of the data file holding the record.
    pub file_id: u32,
    /// Total encoded size of the record, header and checksum included.
    pub record_size: u32,
    /// Absolute byte offset of the value within the file. The record itself
    /// starts at `value_offset - header - key length`, which the reader can
    /// reconstruct because it knows the key.
    pub value_offset: u64,
    /// Timestamp of the record, used for ordering during recovery.
    pub timestamp: u32,
}

/// In-memory mapping from key to [`Entry`].
///
/// All mutation happens under the engine lock; the type itself is a plain
/// map with no interior synchronization.
#[derive(Debug, Default)]
pub struct KeyDir {
    map: HashMap<String, Entry>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Inserts or replaces the entry for `key`.
    pub fn set(&mut self, key: String, entry: Entry) {
        self.map.insert(key, entry);
    }

    /// Looks up the entry for `key`.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.map.get(key)
    }

    /// Removes `key`. Returns `true` if it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over keys. No ordering guarantees.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    /// Iterates over `(key, entry)` pairs. No ordering guarantees.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.map.iter()
    }

    /// Serializes the keydir as a hints stream.
    pub fn encode_hints<W: Write>(&self, mut w: W) -> Result<(), HintsError> {
        for (key, entry) in &self.map {
            w.write_u32::<LittleEndian>(entry.file_id)?;
            w.write_u32::<LittleEndian>(entry.record_size)?;
            w.write_u64::<LittleEndian>(entry.value_offset)?;
            w.write_u32::<LittleEndian>(entry.timestamp)?;
            w.write_u32::<LittleEndian>(key.len() as u32)?;
            w.write_all(key.as_bytes())?;
        }
        Ok(())
    }

    /// Rebuilds a keydir from a hints stream.
    ///
    /// # Errors
    ///
    /// Returns [`HintsError::Corrupt`] if the stream ends mid-tuple, a key
    /// size is implausible, or key bytes are not UTF-8.
    pub fn decode_hints<R: Read>(r: R) -> Result<Self, HintsError> {
        let mut rdr = BufReader::new(r);
        let mut keydir = Self::new();

        loop {
            // EOF before the first field of a tuple is a clean end of stream.
            let file_id = match rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(keydir),
                Err(e) => return Err(HintsError::Io(e)),
            };

            let entry = Entry {
                file_id,
                record_size: read_field(&mut rdr, |r| r.read_u32::<LittleEndian>())?,
                value_offset: read_field(&mut rdr, |r| r.read_u64::<LittleEndian>())?,
                timestamp: read_field(&mut rdr, |r| r.read_u32::<LittleEndian>())?,
            };

            let key_size = read_field(&mut rdr, |r| r.read_u32::<LittleEndian>())?;
            if key_size == 0 || key_size > MAX_HINT_KEY_SIZE {
                return Err(HintsError::Corrupt);
            }

            let mut key_bytes = vec![0u8; key_size as usize];
            rdr.read_exact(&mut key_bytes).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    HintsError::Corrupt
                } else {
                    HintsError::Io(e)
                }
            })?;

            let key = String::from_utf8(key_bytes).map_err(|_| HintsError::Corrupt)?;
            keydir.set(key, entry);
        }
    }

    /// Writes the hints snapshot to `path` atomically: the stream goes to
    /// `<path>.tmp`, is fsynced, then renamed into place.
    pub fn save_hints(&self, path: &Path) -> Result<(), HintsError> {
        let tmp_path = hints_tmp_path(path);

        {
            let file = File::create(&tmp_path)?;
            let mut w = BufWriter::new(file);
            self.encode_hints(&mut w)?;
            w.flush()?;
            w.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Loads a hints snapshot from `path`.
    pub fn load_hints(path: &Path) -> Result<Self, HintsError> {
        let file = File::open(path)?;
        Self::decode_hints(file)
    }
}

/// `<path>.tmp`, next to the hints file itself.
fn hints_tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads one mid-tuple field; EOF here means the tuple is truncated.
fn read_field<R, T, F>(rdr: &mut R, f: F) -> Result<T, HintsError>
where
    R: Read,
    F: FnOnce(&mut R) -> io::Result<T>,
{
    f(rdr).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            HintsError::Corrupt
        } else {
            HintsError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests;
