//! Tests for remote containers

use std::fs;
use std::path::PathBuf;

use arcstore::reader::{location_name, FileTransport};
use arcstore::{ArcError, ArcReader, ReadRecord, ReaderOptions};
use tempfile::TempDir;

use crate::{compressed, flat, sample_records};

fn read_all(reader: &mut ArcReader) -> Vec<ReadRecord> {
    reader.records().collect::<Result<Vec<_>, _>>().unwrap()
}

/// Served directory holding one flat and one compressed container
fn served() -> (TempDir, Vec<u64>) {
    let temp = TempDir::new().unwrap();
    let (gz, offsets) = compressed(&sample_records("remote.arc"));
    fs::write(temp.path().join("remote.arc.gz"), gz).unwrap();
    fs::write(temp.path().join("remote.arc"), flat(&sample_records("remote.arc"))).unwrap();
    (temp, offsets)
}

fn scratch_copies(name: &str) -> Vec<PathBuf> {
    fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().ends_with(name))
                .unwrap_or(false)
        })
        .collect()
}

#[test]
fn test_stream_whole_container() {
    let (temp, _) = served();
    let transport = FileTransport::rooted(temp.path());

    for location in ["file:///remote.arc.gz", "file:///remote.arc"] {
        let mut reader =
            ArcReader::open_remote(&transport, location, 0, ReaderOptions::default()).unwrap();
        let records = read_all(&mut reader);
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].payload(), b"<html>hello</html>");
    }
}

#[test]
fn test_ranged_open_at_offset() {
    let (temp, offsets) = served();
    let transport = FileTransport::rooted(temp.path());

    let mut reader = ArcReader::open_remote(
        &transport,
        "file:///remote.arc.gz",
        offsets[2],
        ReaderOptions::default(),
    )
    .unwrap();
    let records = read_all(&mut reader);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].header.offset, offsets[2]);
    assert_eq!(records[0].header.url, "http://example.com/");
    assert_eq!(records[1].header.offset, offsets[3]);
}

#[test]
fn test_remote_cannot_seek_backwards() {
    let (temp, offsets) = served();
    let transport = FileTransport::rooted(temp.path());
    let mut reader = ArcReader::open_remote(
        &transport,
        "file:///remote.arc.gz",
        offsets[2],
        ReaderOptions::default(),
    )
    .unwrap();
    assert!(reader.record_at(offsets[1]).is_err());
}

#[test]
fn test_remote_encoding_judged_by_name() {
    let (temp, _) = served();
    fs::copy(temp.path().join("remote.arc.gz"), temp.path().join("remote.bin")).unwrap();
    let transport = FileTransport::rooted(temp.path());
    assert!(matches!(
        ArcReader::open_remote(&transport, "file:///remote.bin", 0, ReaderOptions::default()),
        Err(ArcError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_missing_remote() {
    let temp = TempDir::new().unwrap();
    let transport = FileTransport::rooted(temp.path());
    assert!(matches!(
        ArcReader::open_remote(&transport, "file:///absent.arc", 0, ReaderOptions::default()),
        Err(ArcError::Transport(_))
    ));
}

#[test]
fn test_local_copy_removed_on_close() {
    let temp = TempDir::new().unwrap();
    let name = format!("scratch-{}-close.arc.gz", std::process::id());
    fs::write(temp.path().join(&name), compressed(&sample_records("x.arc")).0).unwrap();
    let transport = FileTransport::rooted(temp.path());
    let location = format!("file:///{}", name);

    let mut reader =
        ArcReader::open_remote_local(&transport, &location, 0, ReaderOptions::default()).unwrap();
    assert_eq!(scratch_copies(&name).len(), 1);
    assert_eq!(read_all(&mut reader).len(), 4);
    reader.close().unwrap();
    assert!(scratch_copies(&name).is_empty());
}

#[test]
fn test_local_copy_removed_on_drop() {
    let temp = TempDir::new().unwrap();
    let name = format!("scratch-{}-drop.arc", std::process::id());
    fs::write(temp.path().join(&name), flat(&sample_records("x.arc"))).unwrap();
    let transport = FileTransport::rooted(temp.path());
    let location = format!("file:///{}", name);

    {
        let mut reader =
            ArcReader::open_remote_local(&transport, &location, 0, ReaderOptions::default())
                .unwrap();
        // Local copies support random access
        let offsets: Vec<u64> = read_all(&mut reader).iter().map(|r| r.header.offset).collect();
        assert!(reader.record_at(offsets[1]).is_ok());
    }
    assert!(scratch_copies(&name).is_empty());
}

#[test]
fn test_location_names() {
    assert_eq!(location_name("http://h/x/IAH-1.arc.gz?k=v#f"), "IAH-1.arc.gz");
    assert_eq!(location_name("file:///remote.arc"), "remote.arc");
}
