//! # Engine — the BarrelKV storage engine
//!
//! A persistent, embedded key-value store on the Bitcask model: an
//! append-only log of records on disk, indexed by an in-memory map from key
//! to the location of its latest record. Writes are sequential appends,
//! reads cost a single seek, deletes are tombstone records, and space is
//! reclaimed by background compaction.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                    BARREL                        │
//! │                                                  │
//! │ write.rs → encode record → append to active file │
//! │              |                                   │
//! │              v                                   │
//! │          keydir.set(key, locator)                │
//! │                                                  │
//! │ read.rs  → keydir.get → read_at(locator)         │
//! │              → verify checksum → check expiry    │
//! │                                                  │
//! │ background workers (one lock with foreground):   │
//! │   rotation.rs   — seal active file at size limit │
//! │   compaction.rs — merge stale files, drop dead   │
//! │   workers.rs    — periodic fsync                 │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `lib.rs`       | `Barrel` struct, `init`, `shutdown`, `Drop`        |
//! | [`options`]    | Configuration contract                             |
//! | [`error`]      | Error taxonomy                                     |
//! | `write.rs`     | `put()`, `put_ex()`, `delete()`, `sync()`          |
//! | `read.rs`      | `get()`, `list()`, `len()`, `fold()`               |
//! | `rotation.rs`  | Active-file rotation by size                       |
//! | `compaction.rs`| Merge of stale files + hints snapshot              |
//! | `recovery.rs`  | Keydir rebuild by data-file replay                 |
//! | `workers.rs`   | Background maintenance threads                     |
//!
//! ## On-Disk Layout
//!
//! A database directory contains zero or more data files
//! (`barrel_<id>.db`, highest id active), optionally a keydir snapshot
//! `barrel.hints`, and — while a writer is alive — the lock marker
//! `barrel.lock`.
//!
//! ## Concurrency
//!
//! All public operations take `&self` and serialize on a single mutex
//! covering the active file, the stale file map, and the keydir, making the
//! engine linearizable. Background workers acquire the same mutex per unit
//! of work and observe a shutdown flag on their next tick.

mod compaction;
mod error;
mod options;
mod read;
mod recovery;
mod rotation;
mod workers;
mod write;

pub use error::{Error, Result};
pub use options::Options;

use datafile::DataFile;
use keydir::KeyDir;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use workers::Worker;

/// Zero-length marker file whose existence means a writer is active.
pub const LOCKFILE: &str = "barrel.lock";

/// On-disk keydir snapshot, written at shutdown and after compaction.
pub const HINTS_FILE: &str = "barrel.hints";

/// Maximum allowed key size in bytes, re-exported from the codec.
pub const MAX_KEY_SIZE: usize = record::MAX_KEY_SIZE;

/// Current wall-clock time as seconds since the Unix epoch.
pub(crate) fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// State shared between the foreground operations and the background
/// workers, guarded by the engine mutex.
pub(crate) struct Inner {
    /// The single file accepting appends. `None` in read-only mode and
    /// after shutdown.
    pub(crate) active: Option<DataFile>,
    /// Sealed, read-only data files from prior rotations, by id.
    pub(crate) stale: HashMap<u32, DataFile>,
    /// In-memory index of live keys.
    pub(crate) keydir: KeyDir,
    /// Next unused data-file id, shared by rotation and compaction.
    pub(crate) next_id: u32,
    /// Reusable record-encode buffer.
    pub(crate) encode_buf: Vec<u8>,
    /// Set once by `shutdown`; every operation checks it first.
    pub(crate) closed: bool,
}

impl Inner {
    pub(crate) fn active_mut(&mut self) -> Result<&mut DataFile> {
        self.active.as_mut().ok_or(Error::AlreadyClosed)
    }
}

/// The storage engine. Cheap to share behind an `Arc`; all operations take
/// `&self`.
pub struct Barrel {
    pub(crate) opts: Options,
    pub(crate) inner: Arc<Mutex<Inner>>,
    pub(crate) workers: Mutex<Vec<Worker>>,
}

impl Barrel {
    /// Opens (or creates) the database in `opts.dir` and launches the
    /// background workers.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Locked`] if another writer holds the directory
    /// lock, or with [`Error::Io`] on any underlying file failure. On
    /// failure no lock file is left behind.
    pub fn init(opts: Options) -> Result<Self> {
        if !opts.read_only {
            fs::create_dir_all(&opts.dir)?;
            // Leftover temp from a hints write interrupted mid-snapshot.
            let _ = fs::remove_file(opts.dir.join(format!("{}.tmp", HINTS_FILE)));
        }

        // Enumerate existing data files; every one of them is stale, the
        // active file gets the next id up.
        let ids = datafile::list_ids(&opts.dir)?;
        let mut stale = HashMap::with_capacity(ids.len());
        for &id in &ids {
            stale.insert(id, DataFile::open(&opts.dir, id)?);
        }
        let active_id = ids.last().map(|&id| id + 1).unwrap_or(0);

        // One writer per directory.
        let lock_path = opts.dir.join(LOCKFILE);
        let mut flock = None;
        if !opts.read_only {
            if lock_path.exists() {
                return Err(Error::Locked);
            }
            File::create(&lock_path)?;
            flock = Some(lock_path);
        }

        let inner = match Self::open_inner(&opts, stale, active_id) {
            Ok(inner) => inner,
            Err(e) => {
                if let Some(path) = flock {
                    let _ = fs::remove_file(path);
                }
                return Err(e);
            }
        };

        info!(
            dir = %opts.dir.display(),
            files = ids.len(),
            keys = inner.keydir.len(),
            read_only = opts.read_only,
            "opened barrel store"
        );

        let barrel = Self {
            opts,
            inner: Arc::new(Mutex::new(inner)),
            workers: Mutex::new(Vec::new()),
        };

        if !barrel.opts.read_only {
            barrel.spawn_workers()?;
        }

        Ok(barrel)
    }

    /// Opens the active file and restores the keydir from the hints file,
    /// falling back to a full data-file scan.
    fn open_inner(opts: &Options, stale: HashMap<u32, DataFile>, active_id: u32) -> Result<Inner> {
        let (active, next_id) = if opts.read_only {
            (None, active_id)
        } else {
            (Some(DataFile::create(&opts.dir, active_id)?), active_id + 1)
        };

        let hints_path = opts.dir.join(HINTS_FILE);
        let keydir = if hints_path.exists() {
            match KeyDir::load_hints(&hints_path) {
                Ok(kd) => {
                    // The snapshot is only trustworthy until the next write;
                    // a writer consumes it so that a crash before the next
                    // snapshot falls back to the full scan.
                    if !opts.read_only {
                        fs::remove_file(&hints_path)?;
                    }
                    kd
                }
                Err(e) => {
                    warn!(error = %e, "unreadable hints file, rebuilding keydir from data files");
                    if !opts.read_only {
                        let _ = fs::remove_file(&hints_path);
                    }
                    recovery::build_keydir(&stale)?
                }
            }
        } else {
            recovery::build_keydir(&stale)?
        };

        Ok(Inner {
            active,
            stale,
            keydir,
            next_id,
            encode_buf: Vec::with_capacity(256),
            closed: false,
        })
    }

    /// Acquires the engine mutex, recovering the state from a panicked
    /// holder rather than propagating the poison.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn hints_path(&self) -> std::path::PathBuf {
        self.opts.dir.join(HINTS_FILE)
    }

    /// Database directory this instance is rooted at.
    pub fn dir(&self) -> &Path {
        &self.opts.dir
    }

    /// Writes the hints snapshot, closes every file handle, and releases
    /// the directory lock. Idempotent: repeated calls return `Ok`.
    ///
    /// The embedder is expected to stop accepting new requests first;
    /// `shutdown` drains in-flight operations by taking the engine lock,
    /// then stops and joins the background workers.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Ok(());
            }

            if !self.opts.read_only {
                if let Some(active) = inner.active.as_mut() {
                    active.sync()?;
                }
                inner.keydir.save_hints(&self.hints_path())?;
            }

            // Dropping the handles closes them.
            inner.active = None;
            inner.stale.clear();
            inner.closed = true;

            if !self.opts.read_only {
                fs::remove_file(self.opts.dir.join(LOCKFILE))?;
            }

            info!(dir = %self.opts.dir.display(), "barrel store shut down");
        }

        // Wake the workers out of their tick sleep and wait for them.
        let workers = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for worker in workers {
            worker.stop();
        }

        Ok(())
    }
}

/// Best-effort shutdown on drop. Errors are ignored because `Drop` cannot
/// propagate them; a clean `shutdown()` call beforehand reports them.
impl Drop for Barrel {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests;
