//! Active-file rotation.
//!
//! The rotation worker periodically inspects the active file's size; once
//! it reaches `file_size_limit` the file is sealed, moved into the stale
//! map under its id, and a fresh active file is opened at the next id.
//! Reads against the just-rotated file keep working through the stale map.

use datafile::DataFile;
use tracing::info;

use crate::{Barrel, Inner, Options, Result};

impl Barrel {
    /// Rotates the active file if it has reached the size limit.
    ///
    /// The rotation worker calls this every `check_file_size_interval`;
    /// it is also exposed for embedders that run their own maintenance
    /// schedule. A no-op below the limit, in read-only mode, and after
    /// shutdown.
    pub fn maybe_rotate(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Ok(());
        }
        inner.rotate_if_needed(&self.opts)
    }
}

impl Inner {
    /// Rotates when the active file has reached the configured limit.
    pub(crate) fn rotate_if_needed(&mut self, opts: &Options) -> Result<()> {
        let over_limit = self
            .active
            .as_ref()
            .map(|active| active.size() >= opts.file_size_limit)
            .unwrap_or(false);

        if over_limit {
            self.rotate(opts)?;
        }
        Ok(())
    }

    /// Seals the active file and opens a new one at the next id.
    ///
    /// The new file is created before the swap, so a failure leaves the
    /// current active file in place.
    pub(crate) fn rotate(&mut self, opts: &Options) -> Result<()> {
        self.active_mut()?.sync()?;

        let new_id = self.next_id;
        let new_active = DataFile::create(&opts.dir, new_id)?;

        if let Some(mut old) = self.active.replace(new_active) {
            old.seal();
            info!(
                sealed = old.id(),
                size = old.size(),
                active = new_id,
                "rotated active data file"
            );
            self.stale.insert(old.id(), old);
        }
        self.next_id += 1;
        Ok(())
    }
}
