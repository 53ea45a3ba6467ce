//! Physical Framing
//!
//! The two physical encodings behind one small trait. Everything above this
//! layer (header parsing, sub-headers, digests, iteration) is written once
//! against [`FrameLayer`].
//!
//! ## Frame Lifecycle
//! ```text
//!   at_end? ──no──► begin_record ──► record_bytes (read header/body)
//!      ▲                                     │
//!      │                                     ▼
//!      └──────── end_record / abandon_record ◄┘
//! ```
//! Flat containers hand out the underlying stream directly. Compressed
//! containers open one gzip member per record and hand out its decoded
//! bytes; closing the record drains the member so the stream is left on the
//! next frame boundary.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use flate2::bufread::GzDecoder;

use crate::format::LINE_SEPARATOR;

/// Anything a container can be read from.
pub(crate) trait Source: Read + Seek + Send {}

impl<T: Read + Seek + Send> Source for T {}

pub(crate) type BoxedSource = Box<dyn Source>;

// =============================================================================
// Position Tracking
// =============================================================================

/// Buffered source that knows its absolute position in the container.
pub(crate) struct Tracked {
    inner: BufReader<BoxedSource>,
    pos: u64,
}

impl Tracked {
    /// Wrap a source already positioned at `pos`.
    pub(crate) fn new(source: BoxedSource, pos: u64) -> Self {
        Self {
            inner: BufReader::new(source),
            pos,
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.pos
    }

    /// Move to an absolute position. Forward moves reuse the buffer.
    pub(crate) fn seek_to(&mut self, target: u64) -> io::Result<()> {
        if target >= self.pos {
            let delta = i64::try_from(target - self.pos)
                .map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek distance too large")
                })?;
            self.inner.seek_relative(delta)?;
        } else {
            self.inner.seek(SeekFrom::Start(target))?;
        }
        self.pos = target;
        Ok(())
    }
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl BufRead for Tracked {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.pos += amt as u64;
    }
}

/// Counts the bytes pulled through a borrowed buffered reader.
pub(crate) struct Counted<'a> {
    inner: &'a mut dyn BufRead,
    pub(crate) count: u64,
}

impl<'a> Counted<'a> {
    pub(crate) fn new(inner: &'a mut dyn BufRead) -> Self {
        Self { inner, count: 0 }
    }
}

impl Read for Counted<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

impl BufRead for Counted<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.count += amt as u64;
    }
}

// =============================================================================
// Frame Layer
// =============================================================================

/// Physical-layer primitives a container reader is built on.
pub(crate) trait FrameLayer: Send {
    fn is_compressed(&self) -> bool;

    /// True when no further record starts at the current position
    fn at_end(&mut self) -> io::Result<bool>;

    /// Start a record at the current position, returning its offset
    fn begin_record(&mut self) -> io::Result<u64>;

    /// Bytes of the current record, header line first
    fn record_bytes(&mut self) -> io::Result<&mut dyn BufRead>;

    /// Close a fully consumed record, returning how many unexpected bytes
    /// sat between its declared end and the next record
    fn end_record(&mut self) -> io::Result<u64>;

    /// Give up on the current record and move to where the next may start
    fn abandon_record(&mut self) -> io::Result<()>;

    /// Move to an absolute record offset
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;

    /// Current absolute position (frame start while inside a member)
    fn position(&self) -> u64;
}

// =============================================================================
// Flat Frames
// =============================================================================

/// Uncompressed container: records are laid end to end.
pub(crate) struct FlatFrames {
    src: Tracked,
}

impl FlatFrames {
    pub(crate) fn new(src: Tracked) -> Self {
        Self { src }
    }
}

impl FrameLayer for FlatFrames {
    fn is_compressed(&self) -> bool {
        false
    }

    fn at_end(&mut self) -> io::Result<bool> {
        Ok(self.src.fill_buf()?.is_empty())
    }

    fn begin_record(&mut self) -> io::Result<u64> {
        Ok(self.src.position())
    }

    fn record_bytes(&mut self) -> io::Result<&mut dyn BufRead> {
        Ok(&mut self.src)
    }

    fn end_record(&mut self) -> io::Result<u64> {
        // Skip terminators, stopping at whatever looks like the next header.
        let mut skipped = 0u64;
        loop {
            let buf = self.src.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let newlines = buf.iter().take_while(|&&b| b == LINE_SEPARATOR).count();
            let exhausted = newlines == buf.len();
            self.src.consume(newlines);
            skipped += newlines as u64;
            if !exhausted {
                break;
            }
        }
        if skipped == 0 && !self.at_end()? {
            tracing::debug!(position = self.src.position(), "Record ended without terminator");
        }
        Ok(0)
    }

    fn abandon_record(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.src.seek_to(offset)
    }

    fn position(&self) -> u64 {
        self.src.position()
    }
}

// =============================================================================
// Gzip Frames
// =============================================================================

enum GzipState {
    /// Positioned on a frame boundary
    Between(Tracked),

    /// Decoding the member that starts at `start`
    InMember {
        start: u64,
        decoder: BufReader<GzDecoder<Tracked>>,
    },

    /// Transient while ownership moves between the other states
    Detached,
}

/// Compressed container: one gzip member per record.
pub(crate) struct GzipFrames {
    state: GzipState,
}

impl GzipFrames {
    pub(crate) fn new(src: Tracked) -> Self {
        Self {
            state: GzipState::Between(src),
        }
    }

    fn detached() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "compressed frame reader lost its stream")
    }

    /// Return to the Between state, dropping whatever the decoder held.
    fn leave_member(&mut self) -> io::Result<&mut Tracked> {
        let state = std::mem::replace(&mut self.state, GzipState::Detached);
        self.state = match state {
            GzipState::InMember { decoder, .. } => {
                GzipState::Between(decoder.into_inner().into_inner())
            }
            other => other,
        };
        match &mut self.state {
            GzipState::Between(src) => Ok(src),
            _ => Err(Self::detached()),
        }
    }

    /// Read the member to its end; returns the decoded bytes left over.
    fn drain_member(&mut self) -> io::Result<u64> {
        let decoder = match &mut self.state {
            GzipState::InMember { decoder, .. } => decoder,
            GzipState::Between(_) => return Ok(0),
            GzipState::Detached => return Err(Self::detached()),
        };
        if decoder.fill_buf()?.first() == Some(&LINE_SEPARATOR) {
            decoder.consume(1);
        }
        io::copy(decoder, &mut io::sink())
    }
}

impl FrameLayer for GzipFrames {
    fn is_compressed(&self) -> bool {
        true
    }

    fn at_end(&mut self) -> io::Result<bool> {
        match &mut self.state {
            GzipState::Between(src) => Ok(src.fill_buf()?.is_empty()),
            GzipState::InMember { .. } => Ok(false),
            GzipState::Detached => Err(Self::detached()),
        }
    }

    fn begin_record(&mut self) -> io::Result<u64> {
        self.leave_member()?;
        let state = std::mem::replace(&mut self.state, GzipState::Detached);
        let src = match state {
            GzipState::Between(src) => src,
            _ => return Err(Self::detached()),
        };
        let start = src.position();
        self.state = GzipState::InMember {
            start,
            decoder: BufReader::new(GzDecoder::new(src)),
        };
        Ok(start)
    }

    fn record_bytes(&mut self) -> io::Result<&mut dyn BufRead> {
        match &mut self.state {
            GzipState::InMember { decoder, .. } => Ok(decoder),
            GzipState::Between(_) => Err(io::Error::new(
                io::ErrorKind::Other,
                "no compressed record is open",
            )),
            GzipState::Detached => Err(Self::detached()),
        }
    }

    fn end_record(&mut self) -> io::Result<u64> {
        let drained = self.drain_member();
        self.leave_member()?;
        drained
    }

    fn abandon_record(&mut self) -> io::Result<()> {
        let drained = self.drain_member();
        self.leave_member()?;
        drained.map(|_| ())
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.leave_member()?.seek_to(offset)
    }

    fn position(&self) -> u64 {
        match &self.state {
            GzipState::Between(src) => src.position(),
            GzipState::InMember { start, .. } => *start,
            GzipState::Detached => 0,
        }
    }
}
