//! Tests for WriterPool

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use arcstore::{ArcError, PoolConfig, RecordMeta, WriterPool, WriterSettings};
use tempfile::TempDir;

use crate::{files_in, read_container, FETCH_TIME_MS};

fn pool(dir: &std::path::Path, max_active: usize, wait_ms: u64) -> WriterPool {
    WriterPool::new(
        WriterSettings::builder().dir(dir).prefix("POOL").build(),
        PoolConfig::new(max_active, Duration::from_millis(wait_ms)),
    )
    .unwrap()
}

fn meta(url: &str) -> RecordMeta {
    RecordMeta::new(url, "-", FETCH_TIME_MS, 4)
}

#[test]
fn test_exhausted_pool_times_out() {
    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 1, 100);

    let held = pool.borrow().unwrap();
    let started = Instant::now();
    match pool.borrow() {
        Err(ArcError::PoolExhausted {
            active, max_active, ..
        }) => {
            assert_eq!(active, 1);
            assert_eq!(max_active, 1);
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("borrow should have timed out"),
    }
    assert!(started.elapsed() >= Duration::from_millis(100));

    drop(held);
    assert!(pool.borrow().is_ok());
}

#[test]
fn test_waiting_borrow_gets_returned_writer() {
    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 1, 5_000);
    let held = pool.borrow().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.borrow().map(|_| ()))
    };
    thread::sleep(Duration::from_millis(50));
    drop(held);
    assert!(waiter.join().unwrap().is_ok());
}

#[test]
fn test_returned_writer_keeps_its_file() {
    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 1, 100);
    {
        let mut writer = pool.borrow().unwrap();
        writer.append(&meta("filler:1"), &mut &b"aaaa"[..]).unwrap();
    }
    {
        let mut writer = pool.borrow().unwrap();
        writer.append(&meta("filler:2"), &mut &b"bbbb"[..]).unwrap();
    }
    pool.close().unwrap();

    let files = pool.finished_files();
    assert_eq!(files.len(), 1);
    assert_eq!(read_container(&files[0]).len(), 3);
}

#[test]
fn test_invalidate_removes_writer() {
    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 1, 100);
    let mut writer = pool.borrow().unwrap();
    writer.append(&meta("filler:x"), &mut &b"xxxx"[..]).unwrap();

    let invalid = pool.invalidate(writer).unwrap().unwrap();
    assert!(invalid.to_string_lossy().ends_with(".invalid"));
    assert_eq!(pool.num_active(), 0);
    assert_eq!(pool.num_idle(), 0);
    assert_eq!(pool.finished_files(), vec![invalid]);

    // The slot is free again and the next writer starts a new file
    let mut writer = pool.borrow().unwrap();
    writer.append(&meta("filler:y"), &mut &b"yyyy"[..]).unwrap();
    drop(writer);
    pool.close().unwrap();
    assert_eq!(files_in(temp.path()).len(), 2);
}

#[test]
fn test_closed_pool_refuses_borrows() {
    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 2, 100);
    let out = pool.borrow().unwrap();
    pool.close().unwrap();
    assert!(matches!(pool.borrow(), Err(ArcError::Config(_))));

    // Writers still out are closed when they come back
    drop(out);
    assert_eq!(pool.num_idle(), 0);
    assert!(pool.pool_state().ends_with("closed"));
}

#[test]
fn test_concurrent_producers() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 20;

    let temp = TempDir::new().unwrap();
    let pool = pool(temp.path(), 3, 5_000);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let mut writer = pool.borrow().unwrap();
                    let url = format!("filler:{}-{}", t, i);
                    writer.append(&meta(&url), &mut &b"data"[..]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(pool.num_active(), 0);
    assert!(pool.num_idle() <= 3);
    pool.close().unwrap();

    let files = pool.finished_files();
    assert!(!files.is_empty() && files.len() <= 3);
    let mut urls = Vec::new();
    for file in &files {
        let records = read_container(file);
        assert!(records[0].header.is_container_descriptor());
        urls.extend(records.into_iter().skip(1).map(|r| r.header.url));
    }
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), THREADS * PER_THREAD);
}

#[test]
fn test_requires_output_directory() {
    let settings = WriterSettings {
        dirs: Vec::new(),
        ..WriterSettings::default()
    };
    assert!(WriterPool::new(settings, PoolConfig::default()).is_err());
}
