use super::helpers::{count_data_files, open};
use crate::*;
use anyhow::Result;
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

// --------------------- Restart via hints ---------------------

#[test]
fn values_survive_shutdown_and_reopen() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("a", b"1")?;
        barrel.put("b", b"2")?;
        barrel.shutdown()?;
    }
    assert!(dir.path().join(HINTS_FILE).exists());

    let barrel = open(dir.path());
    assert_eq!(barrel.get("a")?, b"1");
    assert_eq!(barrel.get("b")?, b"2");
    assert_eq!(barrel.len(), 2);
    Ok(())
}

#[test]
fn writable_startup_consumes_the_hints_file() -> Result<()> {
    // A snapshot goes stale on the first write after it; consuming it at
    // startup means a later crash falls back to the full scan.
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"v")?;
        barrel.shutdown()?;
    }

    let barrel = open(dir.path());
    assert!(!dir.path().join(HINTS_FILE).exists());
    assert_eq!(barrel.get("k")?, b"v");
    Ok(())
}

#[test]
fn read_only_startup_keeps_the_hints_file() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"v")?;
        barrel.shutdown()?;
    }

    let barrel = Barrel::init(Options::new(dir.path()).read_only(true))?;
    assert!(dir.path().join(HINTS_FILE).exists());
    assert_eq!(barrel.get("k")?, b"v");
    Ok(())
}

// --------------------- Restart via data-file scan ---------------------

#[test]
fn keydir_rebuilds_from_data_files_without_hints() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("a", b"1")?;
        barrel.put("b", b"2")?;
        barrel.delete("a")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    let barrel = open(dir.path());
    assert!(matches!(barrel.get("a"), Err(Error::MissingKey)));
    assert_eq!(barrel.get("b")?, b"2");
    assert_eq!(barrel.len(), 1);
    Ok(())
}

#[test]
fn scan_recovers_across_rotated_files() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = Barrel::init(Options::new(dir.path()).file_size_limit(64))?;
        for i in 0..10 {
            barrel.put(&format!("key{}", i), b"0123456789")?;
            barrel.maybe_rotate()?;
        }
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;
    assert!(count_data_files(dir.path()) > 1);

    let barrel = open(dir.path());
    for i in 0..10 {
        assert_eq!(barrel.get(&format!("key{}", i))?, b"0123456789");
    }
    Ok(())
}

#[test]
fn scan_applies_last_write_wins() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"old")?;
        barrel.put("k", b"mid")?;
        barrel.put("k", b"new")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    let barrel = open(dir.path());
    assert_eq!(barrel.get("k")?, b"new");
    assert_eq!(barrel.len(), 1);
    Ok(())
}

#[test]
fn scan_does_not_resurrect_keys_from_a_compacted_file() -> Result<()> {
    // A compacted file carries a higher id than the active file while
    // holding older records; replay must order by timestamp, not id.
    let dir = tempdir()?;
    {
        let barrel = Barrel::init(Options::new(dir.path()).file_size_limit(40))?;
        barrel.put("m", b"0123456789012345678")?;
        barrel.maybe_rotate()?;
        barrel.compact()?;

        // Make the overwrite land on a strictly later second.
        thread::sleep(Duration::from_millis(1100));
        barrel.put("m", b"fresh")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    let barrel = open(dir.path());
    assert_eq!(barrel.get("m")?, b"fresh");
    Ok(())
}

#[test]
fn scan_drops_expired_records() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put_ex("temp", b"x", Duration::from_millis(1))?;
        barrel.put("keep", b"v")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    let barrel = open(dir.path());
    assert_eq!(barrel.len(), 1);
    assert!(matches!(barrel.get("temp"), Err(Error::MissingKey)));
    assert_eq!(barrel.get("keep")?, b"v");
    Ok(())
}

// --------------------- Corruption ---------------------

#[test]
fn flipped_value_byte_surfaces_as_checksum_mismatch() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"special-value")?;
        barrel.shutdown()?;
    }

    flip_byte_in_data_files(dir.path(), b"special-value")?;

    let barrel = open(dir.path());
    assert!(matches!(barrel.get("k"), Err(Error::ChecksumMismatch)));
    Ok(())
}

#[test]
fn corrupt_record_halts_replay_but_keeps_earlier_entries() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("first", b"value-one")?;
        barrel.put("second", b"value-two")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    // Corrupting the second record must not take the first one down.
    flip_byte_in_data_files(dir.path(), b"value-two")?;

    let barrel = open(dir.path());
    assert_eq!(barrel.get("first")?, b"value-one");
    assert!(matches!(barrel.get("second"), Err(Error::MissingKey)));
    assert_eq!(barrel.len(), 1);
    Ok(())
}

#[test]
fn garbage_tail_is_tolerated() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("good", b"data")?;
        barrel.shutdown()?;
    }
    fs::remove_file(dir.path().join(HINTS_FILE))?;

    // Simulate a torn append at the end of the newest data file.
    let ids = datafile::list_ids(dir.path())?;
    let newest = dir.path().join(datafile::file_name(*ids.last().unwrap()));
    let mut bytes = fs::read(&newest)?;
    bytes.extend_from_slice(&[0xAB; 7]);
    fs::write(&newest, &bytes)?;

    let barrel = open(dir.path());
    assert_eq!(barrel.get("good")?, b"data");
    Ok(())
}

#[test]
fn startup_removes_interrupted_hints_tmp() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"v")?;
        barrel.shutdown()?;
    }
    let tmp = dir.path().join(format!("{}.tmp", HINTS_FILE));
    fs::write(&tmp, b"half-written snapshot")?;

    let barrel = open(dir.path());
    assert!(!tmp.exists());
    assert_eq!(barrel.get("k")?, b"v");
    Ok(())
}

#[test]
fn corrupt_hints_file_falls_back_to_scan() -> Result<()> {
    let dir = tempdir()?;
    {
        let barrel = open(dir.path());
        barrel.put("k", b"v")?;
        barrel.shutdown()?;
    }
    fs::write(dir.path().join(HINTS_FILE), &[0xFF; 13])?;

    let barrel = open(dir.path());
    assert_eq!(barrel.get("k")?, b"v");
    Ok(())
}

/// Flips one byte of the first occurrence of `needle` inside the data files.
fn flip_byte_in_data_files(dir: &std::path::Path, needle: &[u8]) -> Result<()> {
    for id in datafile::list_ids(dir)? {
        let path = dir.join(datafile::file_name(id));
        let mut bytes = fs::read(&path)?;
        if let Some(pos) = bytes
            .windows(needle.len())
            .position(|window| window == needle)
        {
            bytes[pos] ^= 0xFF;
            fs::write(&path, &bytes)?;
            return Ok(());
        }
    }
    anyhow::bail!("needle not found in any data file")
}
