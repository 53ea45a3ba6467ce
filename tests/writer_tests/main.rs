//! Container writer and writer pool tests
//!
//! These tests verify:
//! - Records written come back byte-for-byte through the reader
//! - Rotation, naming and the first record of every file
//! - Length mismatches and header validation
//! - Pool borrowing, exhaustion, invalidation and concurrent use

mod pool_tests;

use std::path::{Path, PathBuf};

use arcstore::{ArcReader, ReadRecord, ReaderOptions};

/// 2024-01-01T00:00:00Z
pub const FETCH_TIME_MS: i64 = 1_704_067_200_000;

pub fn read_container(path: &Path) -> Vec<ReadRecord> {
    let mut reader = ArcReader::open_path(path, 0, ReaderOptions::strict()).unwrap();
    reader.records().collect::<Result<Vec<_>, _>>().unwrap()
}

/// Files in `dir`, sorted by name
pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}
