//! Tests for header line parsing and building

use std::io::Cursor;

use arcstore::record::{
    descriptor_preamble, format_header_line, parse_header_tokens, read_header_line,
    truncate_mimetype, validate_header_line, ParsedHeader,
};
use arcstore::ArcError;

// =============================================================================
// Tokenizing
// =============================================================================

#[test]
fn test_well_formed_line() {
    let tokens =
        parse_header_tokens("http://a.b/ 1.2.3.4 20240101000000 text/html 42", true, 0).unwrap();
    assert_eq!(
        tokens,
        vec!["http://a.b/", "1.2.3.4", "20240101000000", "text/html", "42"]
    );
}

#[test]
fn test_charset_rejoined_in_lenient_mode() {
    let line = "http://a.b/ 1.2.3.4 20240101000000 text/html; charset=UTF-8 42";
    let tokens = parse_header_tokens(line, false, 0).unwrap();
    assert_eq!(tokens[3], "text/html;charset=UTF-8");
    assert_eq!(tokens[4], "42");

    assert!(matches!(
        parse_header_tokens(line, true, 0),
        Err(ArcError::MalformedHeader { .. })
    ));
}

#[test]
fn test_missing_mimetype_inserted() {
    let line = "http://a.b/ 1.2.3.4 20240101000000 42";
    let tokens = parse_header_tokens(line, false, 0).unwrap();
    assert_eq!(tokens[3], "-");
    assert_eq!(tokens[4], "42");

    assert!(parse_header_tokens(line, true, 0).is_err());
}

#[test]
fn test_spaces_in_url_escaped() {
    let line = "http://a.b/some page here 1.2.3.4 20240101000000 text/html 42";
    let tokens = parse_header_tokens(line, false, 0).unwrap();
    assert_eq!(tokens[0], "http://a.b/some%20page%20here");
    assert_eq!(tokens[1], "1.2.3.4");
    assert_eq!(tokens.len(), 5);
}

#[test]
fn test_tab_in_url_escaped() {
    let tokens =
        parse_header_tokens("http://a.b/x\ty 1.2.3.4 20240101000000 text/html 1", false, 0)
            .unwrap();
    assert_eq!(tokens[0], "http://a.b/x%09y");
}

#[test]
fn test_unrepairable_line_rejected() {
    let err = parse_header_tokens("just some words here", false, 17).unwrap_err();
    match err {
        ArcError::MalformedHeader { offset, .. } => assert_eq!(offset, 17),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(parse_header_tokens("one two", false, 0).is_err());
}

#[test]
fn test_strict_rejects_double_spaces() {
    let line = "http://a.b/  1.2.3.4 20240101000000 text/html 42";
    assert!(parse_header_tokens(line, true, 0).is_err());
    assert_eq!(parse_header_tokens(line, false, 0).unwrap().len(), 5);
}

// =============================================================================
// Reading From A Stream
// =============================================================================

#[test]
fn test_read_skips_blank_lines() {
    let mut input = Cursor::new(b"\n\nhttp://a.b/ - 20240101000000 - 0\n".to_vec());
    let line = read_header_line(&mut input, 0).unwrap();
    assert_eq!(line.as_deref(), Some("http://a.b/ - 20240101000000 - 0"));
}

#[test]
fn test_read_at_end_of_stream() {
    let mut input = Cursor::new(b"\n\n".to_vec());
    assert_eq!(read_header_line(&mut input, 0).unwrap(), None);
}

#[test]
fn test_read_partial_line_is_truncated() {
    let mut input = Cursor::new(b"http://a.b/ - 2024".to_vec());
    assert!(matches!(
        read_header_line(&mut input, 0),
        Err(ArcError::Truncated { .. })
    ));
}

#[test]
fn test_first_record_parse() {
    let preamble = descriptor_preamble(true);
    let metadata = b"<meta/>";
    let length = preamble.len() + metadata.len();
    let mut bytes = format!(
        "filedesc://t.arc 0.0.0.0 20240101000000 text/plain {}",
        length
    )
    .into_bytes();
    bytes.extend_from_slice(preamble.as_bytes());
    bytes.extend_from_slice(metadata);
    bytes.push(b'\n');

    let mut input = Cursor::new(bytes);
    let parsed = ParsedHeader::read(&mut input, true, true, 0)
        .unwrap()
        .unwrap();
    assert_eq!(parsed.url, "filedesc://t.arc");
    assert_eq!(parsed.version.as_deref(), Some("1.1"));
    assert_eq!(parsed.body_length(), metadata.len() as u64);
}

#[test]
fn test_first_record_without_metadata_is_version_one() {
    let preamble = descriptor_preamble(false);
    let bytes = format!(
        "filedesc://t.arc 0.0.0.0 20240101000000 text/plain {}{}\n",
        preamble.len(),
        preamble
    );
    let mut input = Cursor::new(bytes.into_bytes());
    let parsed = ParsedHeader::read(&mut input, true, false, 0)
        .unwrap()
        .unwrap();
    assert_eq!(parsed.version.as_deref(), Some("1.0"));
    assert_eq!(parsed.body_length(), 0);
}

// =============================================================================
// Write Side
// =============================================================================

#[test]
fn test_format_and_validate() {
    let line = format_header_line("http://a.b/", "1.2.3.4", "20240101000000", "text/html", 5);
    assert_eq!(line, "http://a.b/ 1.2.3.4 20240101000000 text/html 5");
    assert!(validate_header_line(&line).is_ok());
}

#[test]
fn test_validate_rejects_whitespace_and_empty_fields() {
    assert!(matches!(
        validate_header_line("http://a.b/x y 1.2.3.4 20240101000000 text/html 5"),
        Err(ArcError::InvalidHeaderLine(_))
    ));
    assert!(validate_header_line("http://a.b/ 1.2.3.4 20240101000000 text/html").is_err());
}

#[test]
fn test_mimetype_truncation() {
    assert_eq!(truncate_mimetype(Some("text/html; charset=utf-8")), "text/html");
    assert_eq!(truncate_mimetype(Some("")), "no-type");
    assert_eq!(truncate_mimetype(None), "no-type");
}
