//! Container Reader
//!
//! Opens a container (local file, in-memory bytes or remote stream), picks
//! the physical encoding by sniffing, and exposes sequential iteration and
//! offset-based random access over its records.
//!
//! ## Responsibilities
//! - Detect flat vs compressed encoding at open time
//! - Parse headers and HTTP sub-headers through the record codec
//! - Stream bodies while digesting the payload
//! - Align to the next record after each one, noting stray bytes
//! - Step over recoverable failures in lenient mode, up to a bound
//!
//! A reader is a single cursor and is not meant to be shared between
//! threads. Open one reader per thread over the same container instead.

mod framing;
mod record;
mod remote;
mod sniff;

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use tempfile::TempPath;

use crate::config::ReaderOptions;
use crate::error::{ArcError, Result};
use crate::format::{DEFAULT_VERSION, MAX_ALLOWED_RECOVERABLES};
use crate::record::{read_sub_header, ParsedHeader};

use framing::{BoxedSource, Counted, FlatFrames, FrameLayer, GzipFrames, Tracked};
use record::{CurrentRecord, DigestSink};

pub use record::{ReadRecord, Record, Records, ValidationReport};
pub use remote::{location_name, FileTransport, Transport};
pub use sniff::{encoding_from_name, is_compressed_arc, is_flat_arc, sniff, Encoding};

/// Reader over one container
pub struct ArcReader {
    layer: Box<dyn FrameLayer>,
    options: ReaderOptions,

    /// Name records report as their source
    identifier: String,

    /// Version from the first record, once seen
    version: Option<String>,

    current: Option<CurrentRecord>,

    /// Anomalies tolerated so far
    problems: Vec<String>,

    /// Local copy of a remote container, removed when the reader goes away
    scratch: Option<TempPath>,
}

impl ArcReader {
    // =========================================================================
    // Opening
    // =========================================================================

    /// Open a container file, positioned at `offset`.
    pub fn open_path(path: &Path, offset: u64, options: ReaderOptions) -> Result<Self> {
        let file = File::open(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let reader = Self::open_seekable(Box::new(file), name, offset, options)?;
        tracing::debug!(
            path = %path.display(),
            offset,
            compressed = reader.is_compressed(),
            "Opened container"
        );
        Ok(reader)
    }

    /// Read a container held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>, name: &str, options: ReaderOptions) -> Result<Self> {
        let cursor = Cursor::new(bytes.into());
        Self::open_seekable(Box::new(cursor), name.to_string(), 0, options)
    }

    /// Stream a remote container through `transport`.
    ///
    /// A non-zero `offset` is requested from the transport as a range, so
    /// only the bytes from that record onward travel. Remote streams are
    /// forward-only and their encoding is judged by name.
    pub fn open_remote(
        transport: &dyn Transport,
        location: &str,
        offset: u64,
        options: ReaderOptions,
    ) -> Result<Self> {
        let name = location_name(location).to_string();
        let encoding = encoding_from_name(&name)?;
        let start = (offset > 0).then_some(offset);
        let stream = transport.open(location, start)?;
        let source = Tracked::new(Box::new(remote::ForwardOnly::new(stream, offset)), offset);
        tracing::debug!(location, offset, ?encoding, "Streaming remote container");
        Ok(Self::with_layer(source, encoding, name, options))
    }

    /// Copy a remote container to local scratch space and read it from
    /// there. The copy is deleted when the reader is closed or dropped.
    pub fn open_remote_local(
        transport: &dyn Transport,
        location: &str,
        offset: u64,
        options: ReaderOptions,
    ) -> Result<Self> {
        let name = location_name(location).to_string();
        let mut stream = transport.open(location, None)?;
        let mut scratch = tempfile::Builder::new()
            .prefix("arcstore-")
            .suffix(&format!("-{}", name))
            .tempfile()?;
        let copied = io::copy(&mut stream, scratch.as_file_mut())?;
        let (mut file, path) = scratch.into_parts();
        file.seek(SeekFrom::Start(0))?;
        tracing::debug!(
            location,
            scratch = %path.display(),
            bytes = copied,
            "Fetched remote container"
        );

        let mut reader = Self::open_seekable(Box::new(file), name, offset, options)?;
        reader.scratch = Some(path);
        Ok(reader)
    }

    fn open_seekable(
        mut source: BoxedSource,
        name: String,
        offset: u64,
        options: ReaderOptions,
    ) -> Result<Self> {
        let mut prefix = Vec::with_capacity(sniff::SNIFF_LENGTH);
        (&mut source)
            .take(sniff::SNIFF_LENGTH as u64)
            .read_to_end(&mut prefix)?;
        let encoding = sniff(&prefix, &name, options.skip_suffix_check)?;
        source.seek(SeekFrom::Start(offset))?;
        Ok(Self::with_layer(
            Tracked::new(source, offset),
            encoding,
            name,
            options,
        ))
    }

    fn with_layer(
        source: Tracked,
        encoding: Encoding,
        identifier: String,
        options: ReaderOptions,
    ) -> Self {
        let layer: Box<dyn FrameLayer> = match encoding {
            Encoding::Flat => Box::new(FlatFrames::new(source)),
            Encoding::Compressed => Box::new(GzipFrames::new(source)),
        };
        Self {
            layer,
            options,
            identifier,
            version: None,
            current: None,
            problems: Vec::new(),
            scratch: None,
        }
    }

    /// Release the container, deleting any local scratch copy.
    pub fn close(mut self) -> Result<()> {
        if let Some(path) = self.scratch.take() {
            let shown = path.display().to_string();
            path.close()?;
            tracing::debug!(scratch = %shown, "Removed scratch copy");
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_compressed(&self) -> bool {
        self.layer.is_compressed()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Container version, falling back to the default until the first
    /// record has been read
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    /// Anomalies tolerated so far
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Advance to the next record.
    ///
    /// Whatever is left of the previous record is drained first. In lenient
    /// mode recoverable failures are logged and stepped over, up to
    /// [`MAX_ALLOWED_RECOVERABLES`] in a row. Deleted records are always
    /// skipped.
    pub fn next_record(&mut self) -> Result<Option<Record<'_>>> {
        self.close_current()?;
        let mut recoverables = 0;
        loop {
            match self.open_next() {
                Ok(true) => break,
                Ok(false) => return Ok(None),
                Err(e) if self.can_step_over(&e) => {
                    recoverables += 1;
                    if recoverables > MAX_ALLOWED_RECOVERABLES {
                        tracing::error!(
                            identifier = %self.identifier,
                            "Too many recoverable failures in a row"
                        );
                        return Err(e);
                    }
                    tracing::warn!(identifier = %self.identifier, error = %e, "Skipping record");
                    self.problems.push(e.to_string());
                    self.discard_current()?;
                }
                Err(e) => {
                    self.current = None;
                    return Err(e);
                }
            }
        }
        Ok(self.current_handle())
    }

    /// Single-pass iterator of fully read records
    pub fn records(&mut self) -> Records<'_> {
        Records {
            reader: self,
            done: false,
        }
    }

    /// Read the record starting exactly at `offset`.
    ///
    /// For compressed containers `offset` must be a frame start, which every
    /// offset the reader reports is.
    pub fn record_at(&mut self, offset: u64) -> Result<Record<'_>> {
        self.current = None;
        self.layer.seek_to(offset)?;
        if !self.open_next()? {
            return Err(ArcError::Truncated {
                offset,
                reason: "no record at offset".to_string(),
            });
        }
        self.current_handle().ok_or_else(|| ArcError::Truncated {
            offset,
            reason: "no record at offset".to_string(),
        })
    }

    fn current_handle(&mut self) -> Option<Record<'_>> {
        let layer = self.layer.as_mut();
        self.current.as_mut().map(|current| Record { current, layer })
    }

    fn can_step_over(&self, e: &ArcError) -> bool {
        match e {
            ArcError::DeletedRecord { .. } => true,
            _ => !self.options.strict && e.is_recoverable(),
        }
    }

    /// Parse the next header (and sub-header) into `current`.
    fn open_next(&mut self) -> Result<bool> {
        if self.layer.at_end()? {
            return Ok(false);
        }
        let offset = self.layer.begin_record()?;
        let strict = self.options.strict;
        let parsed = ParsedHeader::read(self.layer.record_bytes()?, offset == 0, strict, offset)
            .map_err(|e| e.at_offset(offset));
        let parsed = match parsed {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                self.layer.abandon_record()?;
                return Ok(false);
            }
            Err(e) => {
                if let Err(cleanup) = self.layer.abandon_record() {
                    tracing::debug!(offset, error = %cleanup, "Could not skip past bad header");
                }
                return Err(e);
            }
        };

        if let Some(version) = &parsed.version {
            self.version = Some(version.clone());
        }
        let body_length = parsed.body_length();
        let header =
            parsed.into_record_header(self.version().to_string(), offset, &self.identifier);
        let sub_header = self.options.parse_http_headers && header.has_http_sub_header();
        let mut current = CurrentRecord::new(header, body_length, self.options.digest);

        if sub_header {
            let mut counted = Counted::new(self.layer.record_bytes()?);
            let outcome = read_sub_header(&mut counted, body_length, strict, offset);
            let consumed = counted.count;
            match outcome {
                Ok(outcome) => {
                    current.remaining = body_length - outcome.header.len();
                    current.pending_http = outcome.header.raw.clone();
                    for flag in &outcome.flags {
                        self.problems.push(format!("{:?} at offset {}", flag, offset));
                    }
                    current.flags = outcome.flags;
                    current.http = Some(outcome.header);
                }
                Err(e) => {
                    // Leave the rest of the body for discard_current to skip.
                    current.remaining = body_length.saturating_sub(consumed);
                    self.current = Some(current);
                    return Err(e.at_offset(offset));
                }
            }
        }
        current.settle();
        self.current = Some(current);
        Ok(true)
    }

    /// Drain and align past the current record, reporting stray bytes.
    fn close_current(&mut self) -> Result<()> {
        let mut current = match self.current.take() {
            Some(current) => current,
            None => return Ok(()),
        };
        let offset = current.header.offset;
        let declared = current.remaining;
        let src = self.layer.record_bytes()?;
        let drained = io::copy(&mut Read::take(src, declared), &mut DigestSink(&mut current))?;
        if drained < declared {
            return Err(ArcError::Truncated {
                offset,
                reason: format!("{} body bytes missing", declared - drained),
            });
        }
        let stray = self.layer.end_record()?;
        if stray > 0 {
            if self.options.strict {
                return Err(ArcError::RecordLengthMismatch {
                    expected: current.header.length,
                    actual: current.header.length + stray,
                });
            }
            tracing::warn!(offset, stray, "Unexpected bytes after record body");
            self.problems
                .push(format!("{} stray bytes after record at offset {}", stray, offset));
        }
        Ok(())
    }

    /// Throw away a record that failed part way, moving to the next one.
    fn discard_current(&mut self) -> Result<()> {
        if self.layer.is_compressed() || self.current.is_none() {
            self.current = None;
            return Ok(self.layer.abandon_record()?);
        }
        self.close_current()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Read every remaining record, collecting headers and anomalies.
    ///
    /// A failure that cannot be stepped over ends the pass and is reported
    /// as the last problem.
    pub fn validate(&mut self) -> ValidationReport {
        let mut report = ValidationReport::default();
        loop {
            match self.next_record() {
                Ok(Some(record)) => {
                    let header = record.header().clone();
                    if let Err(e) = record.finish() {
                        report.problems.push(e.to_string());
                        break;
                    }
                    report.headers.push(header);
                }
                Ok(None) => break,
                Err(e) => {
                    report.problems.push(e.to_string());
                    break;
                }
            }
        }
        let mut problems = std::mem::take(&mut self.problems);
        problems.append(&mut report.problems);
        report.problems = problems;
        report
    }

    /// Strict validation pass over the rest of the container.
    pub fn is_valid(mut self) -> bool {
        self.options.strict = true;
        self.validate().is_clean()
    }
}

impl Drop for ArcReader {
    fn drop(&mut self) {
        if let Some(path) = self.scratch.take() {
            if let Err(e) = path.close() {
                tracing::warn!(error = %e, "Failed to remove scratch copy");
            }
        }
    }
}

impl std::fmt::Debug for ArcReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcReader")
            .field("identifier", &self.identifier)
            .field("compressed", &self.is_compressed())
            .field("position", &self.layer.position())
            .finish()
    }
}
