//! Encoding detection
//!
//! A compressed container is recognised by the `LX` extra subfield in its
//! first gzip header, not by gzip magic alone; an uncompressed one by the
//! `filedesc://` magic. Filename suffixes are checked only when asked.

use crate::error::{ArcError, Result};
use crate::format::{
    ARC_GZIP_SUBFIELD_ID, ARC_MAGIC, COMPRESSED_ARC_FILE_EXTENSION, DOT_COMPRESSED_FILE_EXTENSION,
    GZIP_BASE_HEADER_LENGTH, GZIP_FLAG_EXTRA, GZIP_MAGIC,
};

/// Bytes read from a container's start before deciding its encoding.
pub(crate) const SNIFF_LENGTH: usize = 64;

/// Physical encoding of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Records laid end to end
    Flat,

    /// One gzip member per record
    Compressed,
}

/// True if `prefix` opens with a gzip header carrying the `LX` subfield.
pub fn is_compressed_arc(prefix: &[u8]) -> bool {
    if prefix.len() < GZIP_BASE_HEADER_LENGTH + 4 || prefix[..3] != GZIP_MAGIC {
        return false;
    }
    if prefix[3] & GZIP_FLAG_EXTRA == 0 {
        return false;
    }
    let xlen = u16::from_le_bytes([prefix[10], prefix[11]]) as usize;
    let extra = &prefix[GZIP_BASE_HEADER_LENGTH + 2..];
    xlen >= 8 && extra[..2] == ARC_GZIP_SUBFIELD_ID
}

/// True if `prefix` opens with the uncompressed container magic.
pub fn is_flat_arc(prefix: &[u8]) -> bool {
    prefix.starts_with(ARC_MAGIC)
}

/// Decide how to read a container from its first bytes and its name.
pub fn sniff(prefix: &[u8], name: &str, skip_suffix_check: bool) -> Result<Encoding> {
    let lower = name.to_ascii_lowercase();
    if is_compressed_arc(prefix)
        && (skip_suffix_check || lower.ends_with(&format!(".{}", COMPRESSED_ARC_FILE_EXTENSION)))
    {
        return Ok(Encoding::Compressed);
    }
    if is_flat_arc(prefix) && (skip_suffix_check || lower.ends_with(".arc")) {
        return Ok(Encoding::Flat);
    }
    Err(ArcError::UnsupportedFormat(format!(
        "{} is not an ARC container",
        name
    )))
}

/// Encoding of a remote container, judged by name alone.
pub fn encoding_from_name(name: &str) -> Result<Encoding> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(&format!(".arc{}", DOT_COMPRESSED_FILE_EXTENSION)) {
        Ok(Encoding::Compressed)
    } else if lower.ends_with(".arc") {
        Ok(Encoding::Flat)
    } else {
        Err(ArcError::UnsupportedFormat(format!(
            "cannot tell the encoding of {} from its name",
            name
        )))
    }
}
