use super::helpers::{count_data_files, open};
use crate::*;
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

// --------------------- Manual rotation checks ---------------------

#[test]
fn no_rotation_below_limit() -> Result<()> {
    let dir = tempdir()?;
    let barrel = open(dir.path());

    barrel.put("k", b"v")?;
    barrel.maybe_rotate()?;

    assert_eq!(count_data_files(dir.path()), 1);
    Ok(())
}

#[test]
fn rotation_seals_active_file_and_opens_next_id() -> Result<()> {
    let dir = tempdir()?;
    let barrel = Barrel::init(Options::new(dir.path()).file_size_limit(64))?;

    // Each record is ~30 bytes; three of them cross the 64-byte limit.
    barrel.put("a", b"0123456789")?;
    barrel.put("b", b"0123456789")?;
    barrel.put("c", b"0123456789")?;
    barrel.maybe_rotate()?;

    assert_eq!(count_data_files(dir.path()), 2);

    // Writes continue in the fresh active file, reads span both.
    barrel.put("d", b"after-rotation")?;
    assert_eq!(barrel.get("a")?, b"0123456789");
    assert_eq!(barrel.get("d")?, b"after-rotation");
    Ok(())
}

#[test]
fn repeated_rotations_allocate_increasing_ids() -> Result<()> {
    let dir = tempdir()?;
    let barrel = Barrel::init(Options::new(dir.path()).file_size_limit(40))?;

    for i in 0..10 {
        barrel.put(&format!("key{}", i), b"0123456789")?;
        barrel.maybe_rotate()?;
    }

    let ids = datafile::list_ids(dir.path())?;
    assert!(ids.len() > 2);
    // Ids are strictly increasing with no reuse.
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1]);
    }

    for i in 0..10 {
        assert_eq!(barrel.get(&format!("key{}", i))?, b"0123456789");
    }
    Ok(())
}

#[test]
fn rotation_never_splits_a_record() -> Result<()> {
    // The limit triggers rotation after a record lands past it; the record
    // itself is never truncated.
    let dir = tempdir()?;
    let barrel = Barrel::init(Options::new(dir.path()).file_size_limit(64))?;

    barrel.put("k", &[b'x'; 43])?;
    barrel.maybe_rotate()?;
    assert_eq!(barrel.get("k")?, &[b'x'; 43][..]);
    assert_eq!(count_data_files(dir.path()), 2);
    Ok(())
}

// --------------------- Background worker ---------------------

#[test]
fn background_worker_rotates_on_its_own() -> Result<()> {
    let dir = tempdir()?;
    let barrel = Barrel::init(
        Options::new(dir.path())
            .file_size_limit(64)
            .check_file_size_interval(Duration::from_millis(10)),
    )?;

    barrel.put("a", &[b'x'; 30])?;
    barrel.put("b", &[b'x'; 30])?;

    // Give the worker a few ticks to notice the oversized active file.
    thread::sleep(Duration::from_millis(300));

    assert!(count_data_files(dir.path()) >= 2);
    assert_eq!(barrel.get("a")?, &[b'x'; 30][..]);
    Ok(())
}
