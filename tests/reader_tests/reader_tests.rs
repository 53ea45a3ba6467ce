//! Tests for sequential and random-access reading

use std::fs;
use std::io::Read;

use arcstore::record::sha1_base32;
use arcstore::{ArcError, ArcReader, ReadRecord, ReaderOptions, RecordFlag};
use tempfile::TempDir;

use crate::{compressed, descriptor, flat, record, sample_records, HTTP_BODY};

// =============================================================================
// Helper Functions
// =============================================================================

fn read_all(reader: &mut ArcReader) -> Vec<ReadRecord> {
    reader.records().collect::<Result<Vec<_>, _>>().unwrap()
}

fn html_payload() -> &'static [u8] {
    b"<html>hello</html>"
}

fn check_sample(records: &[ReadRecord]) {
    assert_eq!(records.len(), 4);
    assert!(records[0].header.is_container_descriptor());
    assert_eq!(records[1].header.url, "dns:example.com");
    assert_eq!(records[1].body, b"1.2.3.4\n");
    assert!(records[1].http.is_none());

    let http = &records[2];
    assert_eq!(http.header.url, "http://example.com/");
    assert_eq!(http.header.length, HTTP_BODY.len() as u64);
    let sub = http.http.as_ref().unwrap();
    assert_eq!(sub.status_code, Some(200));
    assert_eq!(sub.get("Server"), Some("fixture"));
    assert_eq!(http.body, HTTP_BODY);
    assert_eq!(http.payload(), html_payload());
    assert_eq!(http.digest.as_deref(), Some(sha1_base32(html_payload()).as_str()));

    assert_eq!(records[3].body, b"0123456789");
    assert_eq!(records[3].digest.as_deref(), Some(sha1_base32(b"0123456789").as_str()));
}

// =============================================================================
// Sequential Reading
// =============================================================================

#[test]
fn test_flat_sequential() {
    let bytes = flat(&sample_records("sample.arc"));
    let mut reader = ArcReader::from_bytes(bytes, "sample.arc", ReaderOptions::strict()).unwrap();
    assert!(!reader.is_compressed());

    let records = read_all(&mut reader);
    check_sample(&records);
    assert_eq!(reader.version(), "1.0");
    assert!(records.iter().all(|r| r.header.identifier == "sample.arc"));
}

#[test]
fn test_compressed_sequential() {
    let (bytes, offsets) = compressed(&sample_records("sample.arc"));
    let mut reader =
        ArcReader::from_bytes(bytes, "sample.arc.gz", ReaderOptions::strict()).unwrap();
    assert!(reader.is_compressed());

    let records = read_all(&mut reader);
    check_sample(&records);
    let seen: Vec<u64> = records.iter().map(|r| r.header.offset).collect();
    assert_eq!(seen, offsets);
}

#[test]
fn test_descriptor_body_is_metadata() {
    let records = vec![
        descriptor("meta.arc", b"<crawl>job</crawl>"),
        record("filler:a", "text/plain", b"abc"),
    ];
    let mut reader =
        ArcReader::from_bytes(flat(&records), "meta.arc", ReaderOptions::default()).unwrap();

    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.header().version, "1.1");
    assert_eq!(first.header().url, "filedesc://meta.arc");
    drop(first);
    let records = read_all(&mut reader);
    assert_eq!(records[0].header.version, "1.1");

    let bytes = flat(&[descriptor("meta.arc", b"<crawl>job</crawl>")]);
    let mut reader = ArcReader::from_bytes(bytes, "meta.arc", ReaderOptions::default()).unwrap();
    let records = read_all(&mut reader);
    assert_eq!(records[0].body, b"<crawl>job</crawl>");
}

#[test]
fn test_record_handle_streams_sub_header_then_payload() {
    let (bytes, offsets) = compressed(&sample_records("s.arc"));
    let mut reader = ArcReader::from_bytes(bytes, "s.arc.gz", ReaderOptions::default()).unwrap();

    let mut record = reader.record_at(offsets[2]).unwrap();
    let mut head = Vec::new();
    record.dump_http_header(&mut head).unwrap();
    assert!(head.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(record.remaining(), html_payload().len() as u64);
    assert!(record.digest().is_none());

    let mut all = Vec::new();
    record.read_to_end(&mut all).unwrap();
    assert_eq!(all, HTTP_BODY);
    assert!(record.digest().is_some());

    let mut record = reader.record_at(offsets[2]).unwrap();
    record.skip_http_header();
    let mut payload = Vec::new();
    record.read_to_end(&mut payload).unwrap();
    assert_eq!(payload, html_payload());
}

#[test]
fn test_digest_disabled() {
    let bytes = flat(&sample_records("s.arc"));
    let options = ReaderOptions::default().with_digest(false);
    let mut reader = ArcReader::from_bytes(bytes, "s.arc", options).unwrap();
    assert!(read_all(&mut reader).iter().all(|r| r.digest.is_none()));
}

#[test]
fn test_http_parsing_disabled() {
    let bytes = flat(&sample_records("s.arc"));
    let options = ReaderOptions::default().with_http_headers(false);
    let mut reader = ArcReader::from_bytes(bytes, "s.arc", options).unwrap();
    let records = read_all(&mut reader);
    assert!(records[2].http.is_none());
    assert_eq!(records[2].digest.as_deref(), Some(sha1_base32(HTTP_BODY).as_str()));
}

#[test]
fn test_partially_read_record_is_drained() {
    let bytes = flat(&sample_records("s.arc"));
    let mut reader = ArcReader::from_bytes(bytes, "s.arc", ReaderOptions::strict()).unwrap();
    let mut urls = Vec::new();
    while let Some(mut record) = reader.next_record().unwrap() {
        let mut one = [0u8; 1];
        let _ = record.read(&mut one).unwrap();
        urls.push(record.header().url.clone());
    }
    assert_eq!(urls.len(), 4);
    assert_eq!(urls[3], "filler:x");
}

// =============================================================================
// Random Access
// =============================================================================

#[test]
fn test_offsets_match_sequential_reads() {
    let temp = TempDir::new().unwrap();
    for (name, bytes) in [
        ("s.arc", flat(&sample_records("s.arc"))),
        ("s.arc.gz", compressed(&sample_records("s.arc")).0),
    ] {
        let path = temp.path().join(name);
        fs::write(&path, bytes).unwrap();

        let mut reader = ArcReader::open_path(&path, 0, ReaderOptions::default()).unwrap();
        let sequential = read_all(&mut reader);

        // Out of order, on the same reader
        for expected in sequential.iter().rev() {
            let mut record = reader.record_at(expected.header.offset).unwrap();
            let mut body = Vec::new();
            record.read_to_end(&mut body).unwrap();
            assert_eq!(record.header(), &expected.header);
            assert_eq!(body, expected.body);
            assert_eq!(record.digest(), expected.digest.as_deref());
        }

        // Fresh reader opened at an offset
        let http = &sequential[2];
        let mut reader =
            ArcReader::open_path(&path, http.header.offset, ReaderOptions::default()).unwrap();
        let rest = read_all(&mut reader);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].header.url, http.header.url);
        assert_eq!(rest[0].body, http.body);
    }
}

#[test]
fn test_record_at_past_end() {
    let bytes = flat(&sample_records("s.arc"));
    let len = bytes.len() as u64;
    let mut reader = ArcReader::from_bytes(bytes, "s.arc", ReaderOptions::default()).unwrap();
    assert!(reader.record_at(len).is_err());
}

// =============================================================================
// Recovery
// =============================================================================

fn with_junk_line() -> Vec<u8> {
    let mut records = sample_records("j.arc");
    records.insert(2, b"this is not a header\n".to_vec());
    flat(&records)
}

#[test]
fn test_lenient_steps_over_bad_header() {
    let mut reader =
        ArcReader::from_bytes(with_junk_line(), "j.arc", ReaderOptions::default()).unwrap();
    let records = read_all(&mut reader);
    assert_eq!(records.len(), 4);
    assert_eq!(records[2].header.url, "http://example.com/");
    assert_eq!(reader.problems().len(), 1);
}

#[test]
fn test_strict_fails_on_bad_header() {
    let mut reader =
        ArcReader::from_bytes(with_junk_line(), "j.arc", ReaderOptions::strict()).unwrap();
    let results: Vec<_> = reader.records().collect();
    assert_eq!(results.len(), 3);
    assert!(matches!(
        results[2],
        Err(ArcError::MalformedHeader { .. })
    ));
}

#[test]
fn test_too_many_bad_headers() {
    let mut records = vec![descriptor("bad.arc", b"")];
    for _ in 0..12 {
        records.push(b"garbage\n".to_vec());
    }
    records.push(record("filler:x", "text/plain", b"ok"));
    let mut reader =
        ArcReader::from_bytes(flat(&records), "bad.arc", ReaderOptions::default()).unwrap();
    reader.next_record().unwrap();
    assert!(reader.next_record().is_err());
}

#[test]
fn test_deleted_record_skipped_in_both_modes() {
    let deleted = b"DELETED_TIME=20050101000000_DELETER=Kurt_REASON=alexalist\n\nold body".to_vec();
    let records = vec![
        descriptor("d.arc", b""),
        record("http://gone.example/", "text/html", &deleted),
        record("filler:x", "text/plain", b"kept"),
    ];
    for options in [ReaderOptions::default(), ReaderOptions::strict()] {
        let mut reader = ArcReader::from_bytes(flat(&records), "d.arc", options).unwrap();
        let read = read_all(&mut reader);
        assert_eq!(read.len(), 2);
        assert_eq!(read[1].body, b"kept");
    }
}

#[test]
fn test_invalid_status_line_flagged() {
    let body = b"NOT-HTTP something\r\nA: b\r\n\r\npayload".to_vec();
    let records = vec![
        descriptor("f.arc", b""),
        record("http://odd.example/", "text/html", &body),
    ];
    let mut reader =
        ArcReader::from_bytes(flat(&records), "f.arc", ReaderOptions::default()).unwrap();
    let read = read_all(&mut reader);
    assert!(read[1].flags.contains(&RecordFlag::HttpStatusLineInvalid));
    assert_eq!(read[1].payload(), b"payload");

    let mut reader =
        ArcReader::from_bytes(flat(&records), "f.arc", ReaderOptions::strict()).unwrap();
    assert!(reader.records().any(|r| r.is_err()));
}

#[test]
fn test_stray_bytes_in_compressed_member() {
    let mut padded = record("filler:a", "text/plain", b"abc");
    padded.extend_from_slice(b"EXTRA");
    let records = vec![
        descriptor("p.arc", b""),
        padded,
        record("filler:b", "text/plain", b"def"),
    ];
    let (bytes, _) = compressed(&records);

    let mut reader =
        ArcReader::from_bytes(bytes.clone(), "p.arc.gz", ReaderOptions::default()).unwrap();
    let read = read_all(&mut reader);
    assert_eq!(read.len(), 3);
    assert_eq!(read[1].body, b"abc");
    assert!(reader.problems().iter().any(|p| p.contains("5 stray bytes")));

    let mut reader = ArcReader::from_bytes(bytes, "p.arc.gz", ReaderOptions::strict()).unwrap();
    let results: Vec<_> = reader.records().collect();
    assert!(matches!(
        results.last(),
        Some(Err(ArcError::RecordLengthMismatch { .. }))
    ));
}

#[test]
fn test_truncated_body() {
    let mut bytes = flat(&[descriptor("t.arc", b"")]);
    bytes.extend_from_slice(b"filler:x 1.2.3.4 20240101000000 text/plain 100\n0123456789");
    let mut reader = ArcReader::from_bytes(bytes, "t.arc", ReaderOptions::default()).unwrap();
    let results: Vec<_> = reader.records().collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[1], Err(ArcError::Truncated { .. })));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validate_clean_container() {
    let (bytes, _) = compressed(&sample_records("v.arc"));
    let mut reader =
        ArcReader::from_bytes(bytes.clone(), "v.arc.gz", ReaderOptions::default()).unwrap();
    let report = reader.validate();
    assert!(report.is_clean());
    assert_eq!(report.headers.len(), 4);

    let reader = ArcReader::from_bytes(bytes, "v.arc.gz", ReaderOptions::default()).unwrap();
    assert!(reader.is_valid());
}

#[test]
fn test_validate_reports_problems() {
    let mut reader =
        ArcReader::from_bytes(with_junk_line(), "j.arc", ReaderOptions::default()).unwrap();
    let report = reader.validate();
    assert!(!report.is_clean());
    assert_eq!(report.headers.len(), 4);

    let reader =
        ArcReader::from_bytes(with_junk_line(), "j.arc", ReaderOptions::default()).unwrap();
    assert!(!reader.is_valid());
}
