//! Index generator tests
//!
//! These tests verify:
//! - SURT canonicalization of record URLs
//! - Wide CDX files written end to end from a fresh container
//! - The `.open` marker left by a failed pass
//! - Classic CDX listings
//! - Batch indexing across containers


use std::io::Read;
use std::path::{Path, PathBuf};

use arcstore::{ArcWriter, RecordMeta, WriterSettings};
use flate2::read::GzDecoder;

pub const FETCH_TIME_MS: i64 = 1_704_067_200_000;

pub const RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
      Last-Modified: Tue, 15 Nov 1994 08:12:31 GMT\r\n\r\n<p>indexed</p>";

/// Two plain records and one HTTP response in a compressed container
pub fn write_sample(dir: &Path) -> PathBuf {
    let mut writer = ArcWriter::new(
        WriterSettings::builder()
            .dir(dir)
            .prefix("IDX")
            .max_size(1 << 20)
            .build(),
    );
    for (url, body) in [
        ("http://example.com/a.txt", &b"0123456789"[..]),
        ("http://example.com/b.txt", &b"abcdefghij"[..]),
    ] {
        let meta = RecordMeta::new(url, "93.184.216.34", FETCH_TIME_MS, body.len() as u64)
            .content_type("text/plain");
        writer.append(&meta, &mut &body[..]).unwrap();
    }
    let meta = RecordMeta::new(
        "http://www.example.com/page",
        "93.184.216.34",
        FETCH_TIME_MS,
        RESPONSE.len() as u64,
    )
    .content_type("text/html");
    writer.append(&meta, &mut &RESPONSE[..]).unwrap();
    writer.close().unwrap().unwrap()
}

/// Decompressed lines of an index file
pub fn index_lines(path: &Path) -> Vec<String> {
    let mut text = String::new();
    GzDecoder::new(std::fs::File::open(path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    text.lines().map(str::to_string).collect()
}
