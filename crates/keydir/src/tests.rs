use super::*;
use tempfile::tempdir;

fn entry(file_id: u32, value_offset: u64) -> Entry {
    Entry {
        file_id,
        record_size: 25,
        value_offset,
        timestamp: 1700000000,
    }
}

// --------------------- Map operations ---------------------

#[test]
fn set_get_delete() {
    let mut kd = KeyDir::new();
    assert!(kd.is_empty());

    kd.set("a".to_string(), entry(0, 16));
    kd.set("b".to_string(), entry(0, 48));
    assert_eq!(kd.len(), 2);
    assert_eq!(kd.get("a").unwrap().value_offset, 16);
    assert!(kd.get("missing").is_none());

    // overwrite replaces the locator
    kd.set("a".to_string(), entry(1, 96));
    assert_eq!(kd.len(), 2);
    assert_eq!(kd.get("a").unwrap().file_id, 1);

    assert!(kd.delete("a"));
    assert!(!kd.delete("a"));
    assert!(kd.get("a").is_none());
    assert_eq!(kd.len(), 1);
}

#[test]
fn keys_yields_every_live_key() {
    let mut kd = KeyDir::new();
    kd.set("x".to_string(), entry(0, 0));
    kd.set("y".to_string(), entry(0, 0));

    let mut keys: Vec<&String> = kd.keys().collect();
    keys.sort();
    assert_eq!(keys, [&"x".to_string(), &"y".to_string()]);
}

// --------------------- Hints round-trip ---------------------

#[test]
fn hints_round_trip() {
    let mut kd = KeyDir::new();
    kd.set("alpha".to_string(), entry(3, 100));
    kd.set("beta".to_string(), entry(7, 2048));

    let mut buf = Vec::new();
    kd.encode_hints(&mut buf).unwrap();

    let restored = KeyDir::decode_hints(&buf[..]).unwrap();
    assert_eq!(restored.len(), 2);
    assert_eq!(restored.get("alpha"), kd.get("alpha"));
    assert_eq!(restored.get("beta"), kd.get("beta"));
}

#[test]
fn empty_hints_decode_to_empty_keydir() {
    let restored = KeyDir::decode_hints(&[][..]).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn hints_survive_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("barrel.hints");

    let mut kd = KeyDir::new();
    for i in 0..100u64 {
        kd.set(format!("key{:03}", i), entry((i % 4) as u32, i * 37));
    }
    kd.save_hints(&path).unwrap();

    // tmp file must not linger after the atomic rename
    assert!(path.exists());
    assert!(!dir.path().join("barrel.hints.tmp").exists());

    let restored = KeyDir::load_hints(&path).unwrap();
    assert_eq!(restored.len(), 100);
    assert_eq!(restored.get("key042"), kd.get("key042"));
}

// --------------------- Corruption ---------------------

#[test]
fn truncated_tuple_is_corrupt() {
    let mut kd = KeyDir::new();
    kd.set("key".to_string(), entry(0, 16));

    let mut buf = Vec::new();
    kd.encode_hints(&mut buf).unwrap();

    // Cutting into the key bytes leaves a half-written tuple.
    let cut = buf.len() - 1;
    assert!(matches!(
        KeyDir::decode_hints(&buf[..cut]),
        Err(HintsError::Corrupt)
    ));

    // Cutting into the fixed fields as well.
    assert!(matches!(
        KeyDir::decode_hints(&buf[..6]),
        Err(HintsError::Corrupt)
    ));
}

#[test]
fn implausible_key_size_is_corrupt() {
    use byteorder::{LittleEndian, WriteBytesExt};

    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(0).unwrap(); // file_id
    buf.write_u32::<LittleEndian>(25).unwrap(); // record_size
    buf.write_u64::<LittleEndian>(16).unwrap(); // value_offset
    buf.write_u32::<LittleEndian>(1).unwrap(); // timestamp
    buf.write_u32::<LittleEndian>(u32::MAX).unwrap(); // absurd key_size

    assert!(matches!(
        KeyDir::decode_hints(&buf[..]),
        Err(HintsError::Corrupt)
    ));
}

#[test]
fn non_utf8_key_is_corrupt() {
    use byteorder::{LittleEndian, WriteBytesExt};

    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(0).unwrap();
    buf.write_u32::<LittleEndian>(25).unwrap();
    buf.write_u64::<LittleEndian>(16).unwrap();
    buf.write_u32::<LittleEndian>(1).unwrap();
    buf.write_u32::<LittleEndian>(2).unwrap();
    buf.extend_from_slice(&[0xFF, 0xFE]);

    assert!(matches!(
        KeyDir::decode_hints(&buf[..]),
        Err(HintsError::Corrupt)
    ));
}
