//! Record Codec
//!
//! Parses and serializes one record's header line(s), the optional HTTP
//! sub-header embedded in http(s) bodies, and the running payload digest.
//!
//! ## Responsibilities
//! - Tokenize header lines, bounded by the max header-line length
//! - Lenient repair of legacy header anomalies (strict mode rejects them)
//! - Three-line parse of a container's synthetic first record
//! - Build and validate header lines on the write path
//! - SHA-1 digesting of payload bytes, rendered base32

mod digest;
mod header;
mod http;

pub use digest::{sha1_base32, PayloadDigest};
pub use header::{
    descriptor_preamble, format_header_line, parse_header_tokens, read_header_line,
    truncate_mimetype, validate_header_line, ParsedHeader,
};
pub use http::{read_sub_header, HttpHeader, SubHeaderOutcome};

use crate::format::{ARC_MAGIC, MIN_HTTP_HEADER_LENGTH};

/// Header of one stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Fetched URL (or `filedesc://<name>` for the first record)
    pub url: String,

    /// Source address, dotted quad or `-`
    pub ip: String,

    /// 14-digit `yyyyMMddHHmmss` fetch timestamp
    pub date: String,

    /// Declared media type
    pub mimetype: String,

    /// Declared body length in bytes
    pub length: u64,

    /// Container version the record was read under
    pub version: String,

    /// Absolute offset of the record (frame start when compressed)
    pub offset: u64,

    /// Name of the container the record came from
    pub identifier: String,

    /// The header line as tokenized, fields joined by single spaces
    pub header_line: String,
}

impl RecordHeader {
    /// True for the synthetic self-description record that opens a container
    pub fn is_container_descriptor(&self) -> bool {
        self.url.as_bytes().starts_with(ARC_MAGIC)
    }

    /// True if the body should start with an HTTP status line and headers
    pub fn has_http_sub_header(&self) -> bool {
        self.url.to_ascii_lowercase().starts_with("http") && self.length > MIN_HTTP_HEADER_LENGTH
    }
}

/// Non-fatal anomalies a lenient reader noted on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    /// Record body ended before the blank line closing the HTTP headers
    HttpHeaderTruncated,

    /// Status line did not start with `HTTP`
    HttpStatusLineInvalid,

    /// Status line started with `HTTP` but carried no parseable code
    HttpStatusLineException,
}
