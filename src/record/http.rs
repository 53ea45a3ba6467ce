//! HTTP sub-header parsing
//!
//! Bodies of `http(s)` records open with the status line and response
//! headers as the crawler received them. They are read here as raw lines,
//! bounded by what is left of the record body, and kept byte-for-byte so a
//! reader can hand them back ahead of the payload.

use std::io::{BufRead, Read};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ArcError, Result};
use crate::format::{LINE_SEPARATOR, MAX_HEADER_LINE_LENGTH};

use super::RecordFlag;

/// Placeholder some legacy containers carry in place of a removed response.
const DELETED_MARKER: &str = "DELETED";

/// Parsed status line and headers of an embedded HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHeader {
    /// Status line without its terminator
    pub status_line: String,

    /// Status code, when the status line carried a parseable one
    pub status_code: Option<u16>,

    /// Header fields in wire order, continuation lines folded in
    pub headers: Vec<(String, String)>,

    /// Exact bytes read, status line through the closing blank line
    pub raw: Bytes,
}

impl HttpHeader {
    /// First value of a header, matched case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Status code rendered for an index column, `-` when unknown
    pub fn status_text(&self) -> String {
        self.status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    /// Bytes of body the sub-header occupied
    pub fn len(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Result of reading a sub-header: the header and any anomalies noted.
#[derive(Debug, Clone)]
pub struct SubHeaderOutcome {
    pub header: HttpHeader,
    pub flags: Vec<RecordFlag>,

    /// True if the header ran into the end of the record body
    pub reached_end: bool,
}

/// Read the HTTP status line and headers from the start of a record body.
///
/// At most `remaining` bytes are consumed. A status line with no terminator
/// is unsupported; one that starts `DELETED` marks a deleted record. Strict
/// mode fails on a status line that does not start with `HTTP`; lenient mode
/// flags it and carries on.
pub fn read_sub_header<R: BufRead + ?Sized>(
    reader: &mut R,
    remaining: u64,
    strict: bool,
    offset: u64,
) -> Result<SubHeaderOutcome> {
    let mut raw = BytesMut::new();
    let mut flags = Vec::new();
    let mut left = remaining;

    let status_bytes = read_raw_line(reader, left, offset)?;
    left -= status_bytes.len() as u64;
    let status_line = String::from_utf8_lossy(trim_eol(&status_bytes)).into_owned();
    if status_bytes.last() != Some(&LINE_SEPARATOR) {
        return Err(ArcError::UnsupportedSubHeader {
            offset,
            line: status_line,
        });
    }
    if !status_line.starts_with("HTTP") {
        if status_line.starts_with(DELETED_MARKER) {
            return Err(ArcError::DeletedRecord {
                offset,
                line: status_line,
            });
        }
        if strict {
            return Err(ArcError::UnsupportedSubHeader {
                offset,
                line: status_line,
            });
        }
        tracing::debug!(offset, line = %status_line, "Invalid HTTP status line");
        flags.push(RecordFlag::HttpStatusLineInvalid);
    }
    let status_code = parse_status_code(&status_line);
    if status_code.is_none() {
        flags.push(RecordFlag::HttpStatusLineException);
    }
    raw.put_slice(&status_bytes);

    let mut headers: Vec<(String, String)> = Vec::new();
    let mut reached_end = false;
    loop {
        let line = read_raw_line(reader, left, offset)?;
        left -= line.len() as u64;
        if line.last() != Some(&LINE_SEPARATOR) {
            // Only a line cut off by the record boundary lands here.
            tracing::warn!(offset, "HTTP header truncated by end of record");
            flags.push(RecordFlag::HttpHeaderTruncated);
            raw.put_slice(&line);
            reached_end = true;
            break;
        }
        raw.put_slice(&line);
        let content = trim_eol(&line);
        if content.is_empty() {
            break;
        }
        let text = String::from_utf8_lossy(content);
        if text.starts_with(' ') || text.starts_with('\t') {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(text.trim());
            }
            continue;
        }
        if let Some((name, value)) = text.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(SubHeaderOutcome {
        header: HttpHeader {
            status_line,
            status_code,
            headers,
            raw: raw.freeze(),
        },
        flags,
        reached_end: reached_end || left == 0,
    })
}

/// One raw line, terminator included, never reading past `limit` bytes.
fn read_raw_line<R: BufRead + ?Sized>(reader: &mut R, limit: u64, offset: u64) -> Result<Vec<u8>> {
    let cap = limit.min(MAX_HEADER_LINE_LENGTH as u64);
    let mut line = Vec::new();
    Read::take(&mut *reader, cap).read_until(LINE_SEPARATOR, &mut line)?;
    let terminated = line.last() == Some(&LINE_SEPARATOR);
    if !terminated && (line.len() as u64) < cap {
        return Err(ArcError::Truncated {
            offset,
            reason: "end of stream inside HTTP header".to_string(),
        });
    }
    if !terminated && (line.len() as u64) < limit {
        return Err(ArcError::UnsupportedSubHeader {
            offset,
            line: format!("HTTP header line exceeds {} bytes", MAX_HEADER_LINE_LENGTH),
        });
    }
    Ok(line)
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// `HTTP/1.1 200 OK` → 200
fn parse_status_code(status_line: &str) -> Option<u16> {
    let mut parts = status_line.split_whitespace();
    let protocol = parts.next()?;
    if !protocol.starts_with("HTTP") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}
