//! Record handles
//!
//! [`Record`] is a lending view of the reader's current record: it streams
//! the HTTP sub-header bytes first, then the payload straight off the frame
//! layer, folding payload bytes into the digest as they pass.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};

use crate::error::Result;
use crate::record::{HttpHeader, PayloadDigest, RecordFlag, RecordHeader};

use super::framing::FrameLayer;
use super::ArcReader;

/// Reader-side state of the record currently open.
pub(crate) struct CurrentRecord {
    pub(crate) header: RecordHeader,
    pub(crate) http: Option<HttpHeader>,

    /// Sub-header bytes not yet handed to the caller
    pub(crate) pending_http: Bytes,

    /// Payload bytes still unread
    pub(crate) remaining: u64,

    pub(crate) digest: PayloadDigest,
    pub(crate) digest_str: Option<String>,
    pub(crate) flags: Vec<RecordFlag>,
}

impl CurrentRecord {
    pub(crate) fn new(header: RecordHeader, body_length: u64, digest: bool) -> Self {
        Self {
            header,
            http: None,
            pending_http: Bytes::new(),
            remaining: body_length,
            digest: PayloadDigest::new(digest),
            digest_str: None,
            flags: Vec::new(),
        }
    }

    /// Finalize the digest of a payload that turned out to be empty.
    pub(crate) fn settle(&mut self) {
        if self.remaining == 0 && self.digest_str.is_none() {
            self.digest_str = self.digest.finish();
        }
    }

    /// Fold payload bytes in; finalize the digest at the declared end.
    pub(crate) fn consumed(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
        self.remaining -= bytes.len() as u64;
        if self.remaining == 0 {
            self.digest_str = self.digest.finish();
        }
    }
}

/// Writer that feeds a record's digest while discarding bytes.
pub(crate) struct DigestSink<'a>(pub(crate) &'a mut CurrentRecord);

impl Write for DigestSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.consumed(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// Record
// =============================================================================

/// The record the reader is positioned on.
///
/// Reading yields the whole body: HTTP status line and headers (unless
/// skipped) followed by the payload. Dropping the handle early is fine; the
/// reader drains whatever is left before moving on.
pub struct Record<'a> {
    pub(crate) current: &'a mut CurrentRecord,
    pub(crate) layer: &'a mut dyn FrameLayer,
}

impl Record<'_> {
    pub fn header(&self) -> &RecordHeader {
        &self.current.header
    }

    /// Parsed HTTP sub-header, for http(s) records that carry one
    pub fn http_header(&self) -> Option<&HttpHeader> {
        self.current.http.as_ref()
    }

    pub fn flags(&self) -> &[RecordFlag] {
        &self.current.flags
    }

    /// Payload digest, available once the payload has been fully read
    pub fn digest(&self) -> Option<&str> {
        self.current.digest_str.as_deref()
    }

    pub fn is_container_descriptor(&self) -> bool {
        self.header().is_container_descriptor()
    }

    /// Payload bytes not yet read
    pub fn remaining(&self) -> u64 {
        self.current.remaining
    }

    /// Stop handing out the sub-header; reads start at the payload.
    pub fn skip_http_header(&mut self) {
        self.current.pending_http = Bytes::new();
    }

    /// Write the raw sub-header bytes, if any
    pub fn dump_http_header<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        if let Some(http) = self.http_header() {
            out.write_all(&http.raw)?;
        }
        Ok(())
    }

    /// Copy the rest of the record to `out`, returning the bytes written
    pub fn dump<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<u64> {
        Ok(io::copy(self, out)?)
    }

    /// Read to the end, returning the payload digest
    pub fn finish(mut self) -> Result<Option<String>> {
        self.skip_http_header();
        io::copy(&mut self, &mut io::sink())?;
        Ok(self.digest().map(str::to_string))
    }
}

impl Read for Record<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let current = &mut *self.current;
        if !current.pending_http.is_empty() {
            let n = buf.len().min(current.pending_http.len());
            buf[..n].copy_from_slice(&current.pending_http[..n]);
            current.pending_http.advance(n);
            return Ok(n);
        }
        if current.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(current.remaining).unwrap_or(usize::MAX));
        let n = self.layer.record_bytes()?.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "record at offset {} ended {} bytes early",
                    current.header.offset, current.remaining
                ),
            ));
        }
        current.consumed(&buf[..n]);
        Ok(n)
    }
}

// =============================================================================
// Owned Records
// =============================================================================

/// A fully read record, detached from its reader
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub header: RecordHeader,
    pub http: Option<HttpHeader>,

    /// Whole body as stored: sub-header bytes, then payload
    pub body: Vec<u8>,

    pub digest: Option<String>,
    pub flags: Vec<RecordFlag>,
}

impl ReadRecord {
    /// Body bytes after the HTTP sub-header
    pub fn payload(&self) -> &[u8] {
        let skip = self.http.as_ref().map(|h| h.raw.len()).unwrap_or(0);
        &self.body[skip.min(self.body.len())..]
    }
}

/// Single-pass iterator over a reader's remaining records.
///
/// Stops after the first error it yields.
pub struct Records<'a> {
    pub(crate) reader: &'a mut ArcReader,
    pub(crate) done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<ReadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.reader.next_record() {
            Ok(Some(mut record)) => {
                let mut body = Vec::new();
                match record.read_to_end(&mut body) {
                    Ok(_) => Some(Ok(ReadRecord {
                        header: record.header().clone(),
                        http: record.http_header().cloned(),
                        body,
                        digest: record.digest().map(str::to_string),
                        flags: record.flags().to_vec(),
                    })),
                    Err(e) => {
                        let offset = record.header().offset;
                        Some(Err(crate::ArcError::from(e).at_offset(offset)))
                    }
                }
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        };
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Outcome of a full validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Headers of every record read
    pub headers: Vec<RecordHeader>,

    /// Anomalies noted, in the order they were met
    pub problems: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}
