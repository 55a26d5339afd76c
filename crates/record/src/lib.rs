//! # Record — on-disk record codec
//!
//! Serializes and parses the single unit of storage in a BarrelKV data file.
//! A data file is nothing but records written back to back; there is no
//! framing beyond the fixed-width header.
//!
//! ## Binary Record Format
//!
//! ```text
//! [timestamp: u32 LE][expiry: u32 LE][key_size: u32 LE][value_size: u32 LE]
//! [key bytes][value bytes][crc32: u32 LE]
//! ```
//!
//! The CRC32 is computed over everything that precedes it (header + key +
//! value). `expiry == 0` means the record never expires. `value_size == 0`
//! denotes a tombstone — a deletion marker that shadows any earlier record
//! for the same key.
//!
//! ## Example
//!
//! ```rust
//! use record::{encode, decode};
//!
//! let (bytes, value_off) = encode("hello", b"world", 1700000000, 0).unwrap();
//! assert_eq!(&bytes[value_off..value_off + 5], b"world");
//!
//! let rec = decode(&bytes).unwrap();
//! assert_eq!(rec.key, "hello");
//! assert_eq!(rec.value, b"world");
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io;
use thiserror::Error;

/// Width of the fixed header: timestamp + expiry + key_size + value_size.
pub const HEADER_SIZE: usize = 16;

/// Width of the trailing CRC32.
pub const TRAILER_SIZE: usize = 4;

/// Maximum allowed key size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Errors produced while encoding or decoding a record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error while reading or writing record bytes.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The bytes do not form a well-formed record (bad sizes, truncation,
    /// non-UTF-8 key).
    #[error("corrupt record")]
    Corrupt,

    /// The record parsed cleanly but the stored CRC32 does not match the
    /// recomputed one.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// The fixed-width header preceding every record's key and value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Wall-clock creation time, seconds since the Unix epoch.
    pub timestamp: u32,
    /// Absolute expiration instant (seconds since epoch), or 0 for "never".
    pub expiry: u32,
    /// Length of the key in bytes. Always > 0 in a valid record.
    pub key_size: u32,
    /// Length of the value in bytes. 0 denotes a tombstone.
    pub value_size: u32,
}

impl Header {
    /// Total on-disk size of the record this header describes, including the
    /// header itself and the CRC trailer.
    pub fn record_size(&self) -> usize {
        HEADER_SIZE + self.key_size as usize + self.value_size as usize + TRAILER_SIZE
    }
}

/// A fully decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Wall-clock creation time, seconds since the Unix epoch.
    pub timestamp: u32,
    /// Absolute expiration instant, or 0 for "never".
    pub expiry: u32,
    /// The key. Non-empty UTF-8.
    pub key: String,
    /// The value bytes. Empty for a tombstone.
    pub value: Vec<u8>,
}

impl Record {
    /// A tombstone is a record with an empty value.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the record is past its expiry at instant `now`.
    pub fn is_expired(&self, now: u32) -> bool {
        self.expiry != 0 && now >= self.expiry
    }
}

/// Total encoded size for a key/value pair of the given lengths.
pub fn encoded_size(key_len: usize, value_len: usize) -> usize {
    HEADER_SIZE + key_len + value_len + TRAILER_SIZE
}

/// Byte offset of the value within an encoded record for a key of `key_len`
/// bytes. The engine adds this to the record's file offset to compute the
/// absolute value position stored in the keydir.
pub fn value_offset(key_len: usize) -> usize {
    HEADER_SIZE + key_len
}

/// Encodes a record into `buf`, replacing its contents but reusing its
/// allocation. Returns the intra-record offset of the value bytes.
///
/// Tombstones are encoded by passing an empty `value`.
///
/// # Errors
///
/// Returns [`RecordError::Corrupt`] if the key is empty, the key exceeds
/// [`MAX_KEY_SIZE`], or either length does not fit in a `u32`.
pub fn encode_into(
    buf: &mut Vec<u8>,
    key: &str,
    value: &[u8],
    timestamp: u32,
    expiry: u32,
) -> Result<usize, RecordError> {
    if key.is_empty() || key.len() > MAX_KEY_SIZE {
        return Err(RecordError::Corrupt);
    }
    if value.len() > u32::MAX as usize {
        return Err(RecordError::Corrupt);
    }

    buf.clear();
    buf.reserve(encoded_size(key.len(), value.len()));

    buf.write_u32::<LittleEndian>(timestamp)?;
    buf.write_u32::<LittleEndian>(expiry)?;
    buf.write_u32::<LittleEndian>(key.len() as u32)?;
    buf.write_u32::<LittleEndian>(value.len() as u32)?;
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(value);

    // CRC over header + key + value.
    let mut hasher = Crc32::new();
    hasher.update(buf);
    let crc = hasher.finalize();
    buf.write_u32::<LittleEndian>(crc)?;

    Ok(value_offset(key.len()))
}

/// Encodes a record into a fresh buffer. Returns the serialized bytes and the
/// intra-record offset of the value.
pub fn encode(
    key: &str,
    value: &[u8],
    timestamp: u32,
    expiry: u32,
) -> Result<(Vec<u8>, usize), RecordError> {
    let mut buf = Vec::new();
    let off = encode_into(&mut buf, key, value, timestamp, expiry)?;
    Ok((buf, off))
}

/// Parses the fixed header from the start of `bytes`.
///
/// # Errors
///
/// Returns [`RecordError::Corrupt`] if fewer than [`HEADER_SIZE`] bytes are
/// available or the header declares an invalid key size.
pub fn decode_header(bytes: &[u8]) -> Result<Header, RecordError> {
    if bytes.len() < HEADER_SIZE {
        return Err(RecordError::Corrupt);
    }

    let mut rdr = &bytes[..HEADER_SIZE];
    let header = Header {
        timestamp: rdr.read_u32::<LittleEndian>()?,
        expiry: rdr.read_u32::<LittleEndian>()?,
        key_size: rdr.read_u32::<LittleEndian>()?,
        value_size: rdr.read_u32::<LittleEndian>()?,
    };

    if header.key_size == 0 || header.key_size as usize > MAX_KEY_SIZE {
        return Err(RecordError::Corrupt);
    }

    Ok(header)
}

/// Decodes a full record from `bytes`, which must contain exactly one record.
///
/// The stored CRC32 is recomputed over the header, key, and value; a mismatch
/// yields [`RecordError::ChecksumMismatch`]. Truncated input, inconsistent
/// sizes, or a non-UTF-8 key yield [`RecordError::Corrupt`].
pub fn decode(bytes: &[u8]) -> Result<Record, RecordError> {
    let header = decode_header(bytes)?;

    if bytes.len() != header.record_size() {
        return Err(RecordError::Corrupt);
    }

    let payload_end = bytes.len() - TRAILER_SIZE;
    let mut trailer = &bytes[payload_end..];
    let stored_crc = trailer.read_u32::<LittleEndian>()?;

    let mut hasher = Crc32::new();
    hasher.update(&bytes[..payload_end]);
    if hasher.finalize() != stored_crc {
        return Err(RecordError::ChecksumMismatch);
    }

    let key_end = HEADER_SIZE + header.key_size as usize;
    let key = std::str::from_utf8(&bytes[HEADER_SIZE..key_end])
        .map_err(|_| RecordError::Corrupt)?
        .to_string();
    let value = bytes[key_end..payload_end].to_vec();

    Ok(Record {
        timestamp: header.timestamp,
        expiry: header.expiry,
        key,
        value,
    })
}
