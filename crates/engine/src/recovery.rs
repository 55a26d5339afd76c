//! Keydir recovery by data-file replay.
//!
//! When no usable hints snapshot exists, the keydir is rebuilt by scanning
//! every data file in ascending id order and every record within a file in
//! ascending offset order. Replay is ordered by record timestamp: a record
//! only takes effect if it is at least as new as what replay has already
//! seen for that key. Plain id order is not enough — a compacted file
//! carries a higher id than the active file while holding strictly older
//! records.
//!
//! Tombstones are retained (with their timestamps) for the duration of the
//! replay so that an older record in a later file cannot resurrect a
//! deleted key; they are stripped from the final keydir.
//!
//! A corrupt record halts the replay of the offending file with a logged
//! warning; whatever was recovered before it stands, and replay continues
//! with the next file.

use datafile::DataFile;
use keydir::{Entry, KeyDir};
use std::collections::HashMap;
use std::io;
use tracing::warn;

use crate::{now, Result};

/// Replay state for one key: the newest timestamp seen and the locator of
/// its record, or `None` when the newest record is a tombstone (or already
/// expired).
struct Slot {
    timestamp: u32,
    entry: Option<Entry>,
}

/// Rebuilds the keydir by replaying every data file.
pub(crate) fn build_keydir(files: &HashMap<u32, DataFile>) -> Result<KeyDir> {
    let mut ids: Vec<u32> = files.keys().copied().collect();
    ids.sort_unstable();

    let scan_time = now();
    let mut slots: HashMap<String, Slot> = HashMap::new();
    for id in ids {
        replay_file(&files[&id], &mut slots, scan_time)?;
    }

    let mut keydir = KeyDir::new();
    for (key, slot) in slots {
        if let Some(entry) = slot.entry {
            keydir.set(key, entry);
        }
    }
    Ok(keydir)
}

/// Replays one file record by record.
fn replay_file(
    df: &DataFile,
    slots: &mut HashMap<String, Slot>,
    scan_time: u32,
) -> Result<()> {
    let size = df.size();
    let mut offset = 0u64;

    while offset < size {
        let header_bytes = match df.read_at(offset, record::HEADER_SIZE) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(file = df.id(), offset, "truncated record tail, halting replay of file");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let header = match record::decode_header(&header_bytes) {
            Ok(header) => header,
            Err(_) => {
                warn!(file = df.id(), offset, "corrupt record header, halting replay of file");
                break;
            }
        };

        let record_size = header.record_size();
        let bytes = match df.read_at(offset, record_size) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(file = df.id(), offset, "truncated record tail, halting replay of file");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let rec = match record::decode(&bytes) {
            Ok(rec) => rec,
            Err(record::RecordError::Io(e)) => return Err(e.into()),
            Err(e) => {
                warn!(
                    file = df.id(),
                    offset,
                    error = %e,
                    "corrupt record, halting replay of file"
                );
                break;
            }
        };

        // `>=` so that within one file a later same-second write still wins.
        let newer = slots
            .get(&rec.key)
            .map(|slot| rec.timestamp >= slot.timestamp)
            .unwrap_or(true);

        if newer {
            let entry = if rec.is_tombstone() || rec.is_expired(scan_time) {
                None
            } else {
                Some(Entry {
                    file_id: df.id(),
                    record_size: record_size as u32,
                    value_offset: offset + record::value_offset(rec.key.len()) as u64,
                    timestamp: rec.timestamp,
                })
            };
            slots.insert(
                rec.key,
                Slot {
                    timestamp: rec.timestamp,
                    entry,
                },
            );
        }

        offset += record_size as u64;
    }

    Ok(())
}
