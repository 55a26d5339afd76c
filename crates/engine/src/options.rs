/// Configuration for a [`Barrel`](crate::Barrel) instance.
///
/// Options are composed builder-style over a defaults struct:
///
/// ```rust,no_run
/// use engine::{Barrel, Options};
/// use std::time::Duration;
///
/// let barrel = Barrel::init(
///     Options::new("/var/lib/barrelkv")
///         .auto_sync(true)
///         .file_size_limit(256 * 1024 * 1024)
///         .compact_interval(Duration::from_secs(3600)),
/// ).unwrap();
/// # drop(barrel);
/// ```
use std::path::PathBuf;
use std::time::Duration;

/// Default byte threshold at which the active file is rotated (1 GiB).
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 1 << 30;

/// Default cadence for checking whether the active file needs rotation.
pub const DEFAULT_CHECK_FILE_SIZE_INTERVAL: Duration = Duration::from_secs(60);

/// Default cadence of background compaction (6 hours).
pub const DEFAULT_COMPACT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone)]
pub struct Options {
    /// Database directory path.
    pub(crate) dir: PathBuf,
    /// Disables writes and skips lock-file creation. A read-only instance
    /// sees a consistent snapshot as of `init` (read-your-snapshot); it does
    /// not observe writes made by a concurrent writer.
    pub(crate) read_only: bool,
    /// Verbose per-operation logging.
    pub(crate) debug: bool,
    /// Call fsync after every successful write.
    pub(crate) auto_sync: bool,
    /// If set, a background worker fsyncs the active file at this cadence.
    pub(crate) sync_interval: Option<Duration>,
    /// Cadence of the background rotation check.
    pub(crate) check_file_size_interval: Duration,
    /// Byte threshold at which the active file is rotated.
    pub(crate) file_size_limit: u64,
    /// Cadence of background compaction.
    pub(crate) compact_interval: Duration,
}

impl Options {
    /// Options for the database rooted at `dir`, with all other settings at
    /// their defaults.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            read_only: false,
            debug: false,
            auto_sync: false,
            sync_interval: None,
            check_file_size_interval: DEFAULT_CHECK_FILE_SIZE_INTERVAL,
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            compact_interval: DEFAULT_COMPACT_INTERVAL,
        }
    }

    /// Open the store read-only: no lock file, no background workers, and
    /// every mutating call fails with `ReadOnly`.
    pub fn read_only(mut self, yes: bool) -> Self {
        self.read_only = yes;
        self
    }

    /// Enable verbose per-operation logging.
    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }

    /// fsync the active file after every successful write.
    pub fn auto_sync(mut self, yes: bool) -> Self {
        self.auto_sync = yes;
        self
    }

    /// Synonym for [`auto_sync`](Self::auto_sync), spelled out for callers
    /// that care about the durability guarantee rather than the mechanism.
    pub fn always_fsync_on_put(self, yes: bool) -> Self {
        self.auto_sync(yes)
    }

    /// Enable the periodic background fsync worker.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Cadence at which the rotation worker inspects the active file size.
    pub fn check_file_size_interval(mut self, interval: Duration) -> Self {
        self.check_file_size_interval = interval;
        self
    }

    /// Byte threshold at which the active file is rotated. The limit is an
    /// upper bound that triggers rotation, not a hard cap on the last
    /// record; records that could never fit are rejected at validation.
    pub fn file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = bytes;
        self
    }

    /// Cadence of the background compaction worker.
    pub fn compact_interval(mut self, interval: Duration) -> Self {
        self.compact_interval = interval;
        self
    }
}
