//! # DataFile — append-only numbered data file
//!
//! One data file in a BarrelKV database directory. Files are named by a
//! monotonically increasing integer id, zero-padded so that lexicographic
//! filename order matches numeric id order:
//!
//! ```text
//! barrel_000000000.db
//! barrel_000000001.db
//! barrel_000000002.db   <- highest id is the active file
//! ```
//!
//! The active file holds an append handle plus a separate positional-read
//! handle; stale files are opened read-only. Appends return the starting
//! offset of the written bytes so the caller can index into the file later
//! with a single seek.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Filename prefix for data files.
pub const FILE_PREFIX: &str = "barrel_";

/// Filename extension for data files.
pub const FILE_EXT: &str = ".db";

/// Builds the filename for the data file with the given id.
pub fn file_name(id: u32) -> String {
    format!("{}{:09}{}", FILE_PREFIX, id, FILE_EXT)
}

/// Parses a data-file id out of a filename produced by [`file_name`].
/// Returns `None` for anything else in the directory (hints, lock, temp
/// files).
pub fn parse_id(name: &str) -> Option<u32> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_EXT)?
        .parse()
        .ok()
}

/// A single append-only data file.
///
/// Writable files (the active file) carry both an append handle and a read
/// handle; read-only files (stale files) carry only the read handle.
#[derive(Debug)]
pub struct DataFile {
    id: u32,
    path: PathBuf,
    /// Append handle. `None` when the file was opened read-only.
    writer: Option<File>,
    /// Positional-read handle, shared by `read_at`.
    reader: File,
    /// Current byte length. Tracked locally for the writable file so `size`
    /// does not hit the filesystem on every rotation check.
    size: u64,
}

impl DataFile {
    /// Opens (or creates) the data file with `id` in `dir` for appending.
    pub fn create(dir: &Path, id: u32) -> io::Result<Self> {
        let path = dir.join(file_name(id));
        let writer = OpenOptions::new().create(true).append(true).open(&path)?;
        let reader = File::open(&path)?;
        let size = writer.metadata()?.len();

        Ok(Self {
            id,
            path,
            writer: Some(writer),
            reader,
            size,
        })
    }

    /// Opens an existing data file read-only.
    ///
    /// Used for stale files and for every file in a read-only instance.
    pub fn open(dir: &Path, id: u32) -> io::Result<Self> {
        let path = dir.join(file_name(id));
        let reader = File::open(&path)?;
        let size = reader.metadata()?.len();

        Ok(Self {
            id,
            path,
            writer: None,
            reader,
            size,
        })
    }

    /// The numeric id of this file.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Filesystem path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `bytes` and returns the file offset at which they start.
    ///
    /// # Errors
    ///
    /// Fails with `PermissionDenied` if the file was opened read-only, or
    /// with the underlying I/O error.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::PermissionDenied, "data file is read-only")
        })?;

        let offset = self.size;
        writer.write_all(bytes)?;
        self.size += bytes.len() as u64;
        Ok(offset)
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// A short read surfaces as `UnexpectedEof`.
    pub fn read_at(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        // io traits are implemented for &File, so positional reads do not
        // need a mutable handle. Callers serialize access via the engine
        // lock.
        let mut rdr = &self.reader;
        rdr.seek(SeekFrom::Start(offset))?;
        rdr.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Drops the append handle, leaving the file read-only. Called when a
    /// rotated file is sealed into the stale set.
    pub fn seal(&mut self) {
        self.writer = None;
    }

    /// Flushes buffered writes to the underlying storage (fsync).
    ///
    /// A no-op for read-only files.
    pub fn sync(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.sync_all()?;
        }
        Ok(())
    }

    /// Current byte length of the file.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Lists the data-file ids present in `dir`, sorted ascending.
///
/// Non-data files (hints, lock, anything else) are skipped. Returns an empty
/// vec if the directory does not exist yet.
pub fn list_ids(dir: &Path) -> io::Result<Vec<u32>> {
    let mut ids = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(id) = parse_id(name) {
                ids.push(id);
            }
        }
    }

    ids.sort_unstable();
    Ok(ids)
}
