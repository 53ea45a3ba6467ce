//! Compressed frames
//!
//! Each record is gzipped on its own into memory. The encoder emits a bare
//! 10-byte header with no flags set; the `LX` extra field is spliced in
//! after it so readers can tell these members from arbitrary gzip data:
//!
//! ```text
//!   encoder:  1f 8b 08 00 | mtime(4) | xfl | os | deflate... | crc | isize
//!   frame:    1f 8b 08 04 | mtime(4) | xfl | 03 | 08 00 'L' 'X' 04 00 00 00 00 00 | deflate...
//! ```

use std::io::{self, Write};

use bytes::{BufMut, Bytes, BytesMut};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{ArcError, Result};
use crate::format::{
    ARC_GZIP_EXTRA_FIELD, GZIP_BASE_HEADER_LENGTH, GZIP_FLAG_EXTRA, GZIP_MAGIC, GZIP_OS_UNIX,
};

/// In-memory gzip member for one record
pub(crate) struct FrameEncoder {
    encoder: GzEncoder<Vec<u8>>,
}

impl FrameEncoder {
    pub(crate) fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
        }
    }

    /// Finish the member and splice in the identifying extra field.
    pub(crate) fn finish(self) -> Result<Bytes> {
        let member = self.encoder.finish()?;
        splice_arc_extra(&member)
    }
}

impl Write for FrameEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

/// Turn a plain gzip member into a compressed-container frame.
pub fn splice_arc_extra(member: &[u8]) -> Result<Bytes> {
    if member.len() < GZIP_BASE_HEADER_LENGTH || member[..3] != GZIP_MAGIC {
        return Err(ArcError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "encoder produced no gzip header",
        )));
    }
    if member[3] != 0 {
        return Err(ArcError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("gzip header flags already set: {:#04x}", member[3]),
        )));
    }

    let mut frame = BytesMut::with_capacity(member.len() + ARC_GZIP_EXTRA_FIELD.len());
    frame.put_slice(&member[..GZIP_BASE_HEADER_LENGTH]);
    frame[3] = GZIP_FLAG_EXTRA;
    frame[9] = GZIP_OS_UNIX;
    frame.put_slice(&ARC_GZIP_EXTRA_FIELD);
    frame.put_slice(&member[GZIP_BASE_HEADER_LENGTH..]);
    Ok(frame.freeze())
}
