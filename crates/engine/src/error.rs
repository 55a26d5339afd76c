/// The error taxonomy surfaced by the engine.
///
/// Recoverable conditions (`MissingKey`, `ExpiredKey`, `ChecksumMismatch`,
/// `InvalidKey`, `InvalidValue`, `ReadOnly`) are surfaced to the caller
/// unchanged; `Io` carries the underlying cause and is never retried by the
/// engine itself.
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A mutating call on a read-only instance.
    #[error("store is opened in read-only mode")]
    ReadOnly,

    /// Another writer holds the directory lock.
    #[error("another process holds the directory lock")]
    Locked,

    /// The key is not present in the keydir.
    #[error("key not found")]
    MissingKey,

    /// The key exists but is past its expiry.
    #[error("key is past its expiry")]
    ExpiredKey,

    /// Record integrity failure on read.
    #[error("record checksum mismatch")]
    ChecksumMismatch,

    /// Encode/decode produced or observed malformed bytes.
    #[error("corrupt record")]
    CorruptRecord,

    /// Key precondition violated.
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    /// Value precondition violated.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    /// Underlying file operation failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Operation after `shutdown`.
    #[error("store is already shut down")]
    AlreadyClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<record::RecordError> for Error {
    fn from(e: record::RecordError) -> Self {
        match e {
            record::RecordError::Io(io) => Error::Io(io),
            record::RecordError::Corrupt => Error::CorruptRecord,
            record::RecordError::ChecksumMismatch => Error::ChecksumMismatch,
        }
    }
}

impl From<keydir::HintsError> for Error {
    fn from(e: keydir::HintsError) -> Self {
        match e {
            keydir::HintsError::Io(io) => Error::Io(io),
            keydir::HintsError::Corrupt => Error::CorruptRecord,
        }
    }
}
