use crate::{Barrel, Options};
use std::path::Path;

/// Opens a store in `dir` with default options.
pub fn open(dir: &Path) -> Barrel {
    Barrel::init(Options::new(dir)).unwrap()
}

/// Number of data files currently on disk.
pub fn count_data_files(dir: &Path) -> usize {
    datafile::list_ids(dir).unwrap().len()
}

/// True if any data file in `dir` contains `needle` as a byte subsequence.
pub fn data_files_contain(dir: &Path, needle: &[u8]) -> bool {
    for id in datafile::list_ids(dir).unwrap() {
        let bytes = std::fs::read(dir.join(datafile::file_name(id))).unwrap();
        if bytes.windows(needle.len()).any(|w| w == needle) {
            return true;
        }
    }
    false
}
