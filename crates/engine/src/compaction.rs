//! Compaction: merges the live records out of stale files into a single
//! fresh file and reclaims the rest.
//!
//! The active file is never merged, to keep the write path out of the way.
//! The merge iterates keydir entries pointing into stale files, re-encodes
//! each live record into the merged file, swaps the keydir over, deletes
//! the old stale files, and finishes with a fresh hints snapshot.
//!
//! Tombstones are dropped naturally (a deleted key has no keydir entry, so
//! nothing is rewritten); entries found expired are pruned instead of
//! rewritten. The whole pass runs under the engine lock, so no concurrent
//! put can move the keydir underneath it.

use datafile::DataFile;
use keydir::Entry;
use std::fs;
use tracing::{info, warn};

use crate::{now, Barrel, Error, Inner, Options, Result, HINTS_FILE};

impl Barrel {
    /// Merges all stale files into a single compacted file and writes a
    /// fresh hints snapshot. A no-op when there are no stale files.
    ///
    /// Called by the background compaction worker at `compact_interval`;
    /// callers may also invoke it directly (e.g. before a backup).
    ///
    /// # Errors
    ///
    /// An I/O or integrity failure mid-merge aborts the pass: the partially
    /// written merged file is deleted and the pre-merge state stays intact.
    pub fn compact(&self) -> Result<()> {
        if self.opts.read_only {
            return Err(Error::ReadOnly);
        }

        let mut inner = self.lock();
        if inner.closed {
            return Err(Error::AlreadyClosed);
        }
        inner.compact(&self.opts)
    }
}

impl Inner {
    pub(crate) fn compact(&mut self, opts: &Options) -> Result<()> {
        if self.stale.is_empty() {
            return Ok(());
        }

        let merged_id = self.next_id;
        let mut merged = DataFile::create(&opts.dir, merged_id)?;
        self.next_id += 1;

        // Rewrite live records, collecting the keydir updates to apply only
        // once the merged file is fully written and synced. An abort then
        // leaves the keydir untouched.
        let scan_time = now();
        let mut updates: Vec<(String, Entry)> = Vec::new();
        let mut expired: Vec<String> = Vec::new();
        let mut buf = std::mem::take(&mut self.encode_buf);

        let pass = (|| -> Result<()> {
            for (key, entry) in self.keydir.iter() {
                if !self.stale.contains_key(&entry.file_id) {
                    continue;
                }

                let rec = self.read_record(key, entry)?;
                if rec.is_expired(scan_time) {
                    expired.push(key.clone());
                    continue;
                }

                let value_off =
                    record::encode_into(&mut buf, &rec.key, &rec.value, rec.timestamp, rec.expiry)?;
                let offset = merged.append(&buf)?;
                updates.push((
                    key.clone(),
                    Entry {
                        file_id: merged_id,
                        record_size: buf.len() as u32,
                        value_offset: offset + value_off as u64,
                        timestamp: rec.timestamp,
                    },
                ));
            }
            merged.sync()?;
            Ok(())
        })();
        self.encode_buf = buf;

        if let Err(e) = pass {
            let path = merged.path().to_path_buf();
            drop(merged);
            let _ = fs::remove_file(&path);
            warn!(error = %e, "compaction aborted, pre-merge state left intact");
            return Err(e);
        }

        let rewritten = updates.len();
        for (key, entry) in updates {
            self.keydir.set(key, entry);
        }
        for key in &expired {
            self.keydir.delete(key);
        }

        // The merged file replaces every stale file. Removal is best-effort;
        // a file that cannot be deleted only wastes space.
        let reclaimed = self.stale.len();
        for (_, df) in self.stale.drain() {
            let path = df.path().to_path_buf();
            drop(df);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove stale data file");
            }
        }

        if rewritten > 0 {
            // Reopen read-only: stale files never accept appends.
            drop(merged);
            self.stale.insert(merged_id, DataFile::open(&opts.dir, merged_id)?);
        } else {
            // Nothing live in the old files; no point keeping an empty one.
            let path = merged.path().to_path_buf();
            drop(merged);
            let _ = fs::remove_file(&path);
        }

        self.keydir.save_hints(&opts.dir.join(HINTS_FILE))?;

        info!(
            rewritten,
            expired = expired.len(),
            reclaimed,
            merged = merged_id,
            "compaction finished"
        );
        Ok(())
    }
}
