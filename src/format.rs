//! ARC Format Model
//!
//! Byte-level layout constants and version rules shared by the reader,
//! writer and index generator.
//!
//! ## Container Layout (uncompressed)
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ filedesc://<name> 0.0.0.0 <yyyyMMddHHmmss> text/plain <len>\n │
//! │ 1 <0|1> InternetArchive\n                                    │
//! │ URL IP-address Archive-date Content-type Archive-length\n    │
//! │ [metadata body]\n                                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ <url> <ip> <yyyyMMddHHmmss> <mime> <len>\n                   │
//! │ <len bytes of body: [HTTP status + headers\r\n\r\n] payload> │
//! │ \n                                                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │ ... repeated for each record ...                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Compressed Frame Header
//! Every record is its own gzip member whose header carries the `LX`
//! extra field:
//! ```text
//! ┌────┬────┬────┬─────┬───────────┬─────┬────┬──────────────────────────────┐
//! │1f  │8b  │08  │FLG=4│MTIME (4)  │XFL  │OS=3│XLEN=8 'L' 'X' 04 00 00000000 │
//! └────┴────┴────┴─────┴───────────┴─────┴────┴──────────────────────────────┘
//! ```

/// Magic prefix at the start of every uncompressed container.
pub const ARC_MAGIC: &[u8] = b"filedesc://";

/// Separator between header fields.
pub const FIELD_SEPARATOR: u8 = b' ';

/// Line and record terminator.
pub const LINE_SEPARATOR: u8 = b'\n';

/// Longest header line a reader will accept (and a writer will emit).
pub const MAX_HEADER_LINE_LENGTH: usize = 100 * 1024;

/// Bytes of the fixed gzip header before any optional fields.
pub const GZIP_BASE_HEADER_LENGTH: usize = 10;

/// First bytes of any gzip member: ID1, ID2, CM (deflate).
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// FLG bit signalling an extra field follows the base header.
pub const GZIP_FLAG_EXTRA: u8 = 0x04;

/// OS byte written into every compressed frame (Unix).
pub const GZIP_OS_UNIX: u8 = 3;

/// The identifying extra field, XLEN included.
pub const ARC_GZIP_EXTRA_FIELD: [u8; 10] = [8, 0, b'L', b'X', 4, 0, 0, 0, 0, 0];

/// Subfield id that marks a gzip stream as a compressed ARC.
pub const ARC_GZIP_SUBFIELD_ID: [u8; 2] = [b'L', b'X'];

/// Extension of uncompressed containers.
pub const ARC_FILE_EXTENSION: &str = "arc";

/// Extension of compressed containers.
pub const COMPRESSED_ARC_FILE_EXTENSION: &str = "arc.gz";

/// Dot-prefixed gzip extension.
pub const DOT_COMPRESSED_FILE_EXTENSION: &str = ".gz";

/// Suffix carried by a container while it is being written.
pub const OCCUPIED_SUFFIX: &str = ".open";

/// Suffix given to containers a pool has invalidated.
pub const INVALID_SUFFIX: &str = ".invalid";

/// Placeholder address of the synthetic first record.
pub const FIRST_RECORD_IP: &str = "0.0.0.0";

/// Media type of the synthetic first record.
pub const FIRST_RECORD_MIMETYPE: &str = "text/plain";

/// Producer name on the second line of the first record.
pub const PRODUCER_NAME: &str = "InternetArchive";

/// Field-name line of the first record. Readers skip it rather than trust it.
pub const FIELD_NAMES_LINE: &str = "URL IP-address Archive-date Content-type Archive-length";

/// Media type recorded when the fetcher supplied none.
pub const NO_TYPE_MIMETYPE: &str = "no-type";

/// Version reported when a reader never saw the first record.
pub const DEFAULT_VERSION: &str = "1.1";

/// Number of fields in a version-1 header line.
pub const VERSION_1_FIELD_COUNT: usize = 5;

/// Bodies of `http(s)` records at or below this size carry no sub-header.
/// `min(len("HTTP/1.1 200 OK\r\n"), len("GET / HTTP/1.0\n\r"))`.
pub const MIN_HTTP_HEADER_LENGTH: u64 = 16;

/// Lenient readers give up after this many recoverable failures in a row.
pub const MAX_ALLOWED_RECOVERABLES: usize = 10;

/// Version string of a container with or without a metadata body.
pub fn version_for(has_metadata: bool) -> &'static str {
    if has_metadata {
        "1.1"
    } else {
        "1.0"
    }
}

/// Strip `.open`, `.gz` and `.arc` in that order, yielding the bare stem.
pub fn strip_container_suffixes(name: &str) -> &str {
    let name = name.strip_suffix(OCCUPIED_SUFFIX).unwrap_or(name);
    let name = name
        .strip_suffix(DOT_COMPRESSED_FILE_EXTENSION)
        .unwrap_or(name);
    name.strip_suffix(".arc").unwrap_or(name)
}
