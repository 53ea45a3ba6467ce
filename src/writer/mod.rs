//! Container Writer
//!
//! Appends records to a rotating series of container files.
//!
//! ## Write Path
//! ```text
//! append(meta, content)
//!   │
//!   ├─► build + validate header line    (nothing written on failure)
//!   ├─► rotate if the file reached max_size
//!   ├─► open lazily: pick dir, name `.open` file, write first record
//!   ├─► header line + exactly `length` body bytes + terminator
//!   │     compressed: into an in-memory gzip member, LX field spliced in
//!   │     flat:       straight to the buffered file
//!   └─► return the record's offset
//! ```
//!
//! Closing flushes the file and renames it from `<name>.open` to `<name>`.
//! A writer is used by one thread at a time; fan out through a
//! [`WriterPool`](crate::pool::WriterPool).

mod content;
mod frame;
mod naming;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{MetadataSource, WriterSettings};
use crate::error::{ArcError, Result};
use crate::format::{
    strip_container_suffixes, ARC_MAGIC, DOT_COMPRESSED_FILE_EXTENSION, FIRST_RECORD_IP,
    FIRST_RECORD_MIMETYPE, INVALID_SUFFIX, LINE_SEPARATOR, OCCUPIED_SUFFIX,
};
use crate::record::{
    descriptor_preamble, format_header_line, truncate_mimetype, validate_header_line,
};
use crate::timestamp;

pub use content::{ContentStream, ReplayContent};
pub use frame::splice_arc_extra;
pub use naming::FileNamer;

use frame::FrameEncoder;

/// Producer-supplied description of one record
#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub url: String,

    /// Media type as fetched; cut down to its bare type when written
    pub content_type: Option<String>,

    /// Source address, dotted quad or `-`
    pub ip: String,

    /// Fetch start, epoch milliseconds
    pub timestamp_ms: i64,

    /// Exact body length in bytes
    pub length: u64,
}

impl RecordMeta {
    pub fn new(
        url: impl Into<String>,
        ip: impl Into<String>,
        timestamp_ms: i64,
        length: u64,
    ) -> Self {
        Self {
            url: url.into(),
            content_type: None,
            ip: ip.into(),
            timestamp_ms,
            length,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The header line this record will be written with
    pub fn header_line(&self) -> Result<String> {
        if self.timestamp_ms <= 0 {
            return Err(ArcError::InvalidHeaderLine(format!(
                "timestamp must be positive, got {}",
                self.timestamp_ms
            )));
        }
        let date = timestamp::fourteen_digit(self.timestamp_ms).ok_or_else(|| {
            ArcError::InvalidHeaderLine(format!("timestamp out of range: {}", self.timestamp_ms))
        })?;
        let mimetype = truncate_mimetype(self.content_type.as_deref());
        let line = format_header_line(&self.url, &self.ip, &date, &mimetype, self.length);
        validate_header_line(&line)?;
        Ok(line)
    }
}

/// The backing file currently being appended to
struct OpenContainer {
    file: BufWriter<File>,

    /// Path while in progress (ends in `.open`)
    path: PathBuf,

    /// Bytes written so far
    written: u64,
}

/// Appends records to rotating container files
pub struct ArcWriter {
    settings: Arc<WriterSettings>,
    namer: Arc<FileNamer>,
    open: Option<OpenContainer>,

    /// Containers closed by this writer, final names
    finished: Vec<PathBuf>,
}

impl ArcWriter {
    /// Create a writer with its own serial numbering
    pub fn new(settings: WriterSettings) -> Self {
        Self::with_namer(Arc::new(settings), Arc::new(FileNamer::new()))
    }

    /// Create a writer sharing settings and numbering with others
    pub fn with_namer(settings: Arc<WriterSettings>, namer: Arc<FileNamer>) -> Self {
        Self {
            settings,
            namer,
            open: None,
            finished: Vec::new(),
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Path of the file being written, `.open` suffix included
    pub fn current_path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// Bytes written to the current file (0 when none is open)
    pub fn position(&self) -> u64 {
        self.open.as_ref().map(|o| o.written).unwrap_or(0)
    }

    /// Final names of every container this writer has closed
    pub fn finished_files(&self) -> &[PathBuf] {
        &self.finished
    }

    pub(crate) fn drain_finished(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.finished)
    }

    // =========================================================================
    // Appending
    // =========================================================================

    /// Append one record, returning the offset it was written at.
    ///
    /// Exactly `meta.length` bytes are copied from `content`. A stream that
    /// runs short, or one that still reports bytes afterwards, fails with
    /// [`ArcError::RecordLengthMismatch`]. For compressed containers nothing
    /// reaches the file in that case; a flat container may hold a partial
    /// record and should be discarded.
    pub fn append<C: ContentStream + ?Sized>(
        &mut self,
        meta: &RecordMeta,
        content: &mut C,
    ) -> Result<u64> {
        let header_line = meta.header_line()?;
        self.rotate_if_full()?;
        self.ensure_open()?;
        let length = meta.length;
        self.emit(|out| {
            out.write_all(header_line.as_bytes())?;
            out.write_all(&[LINE_SEPARATOR])?;
            copy_body(out, content, length)?;
            out.write_all(&[LINE_SEPARATOR])?;
            Ok(())
        })
    }

    /// Write one record's bytes to the open file, as a frame if compressing.
    fn emit<F>(&mut self, write_record: F) -> Result<u64>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let compress = self.settings.compress;
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| ArcError::Config("writer has no open container".to_string()))?;
        let offset = open.written;
        if compress {
            let mut encoder = FrameEncoder::new();
            write_record(&mut encoder)?;
            let frame = encoder.finish()?;
            open.file.write_all(&frame)?;
            open.written += frame.len() as u64;
        } else {
            let mut counting = CountingWriter {
                inner: &mut open.file,
                count: 0,
            };
            let result = write_record(&mut counting);
            open.written += counting.count;
            result?;
        }
        Ok(offset)
    }

    // =========================================================================
    // File Lifecycle
    // =========================================================================

    fn ensure_open(&mut self) -> Result<()> {
        if self.open.is_some() {
            return Ok(());
        }
        let dir = self.namer.next_dir(&self.settings)?;
        let name = FileNamer::file_name(
            &self.settings,
            &timestamp::now_fourteen_digit(),
            self.namer.next_serial(),
        );
        let descriptor = self.build_descriptor(&name)?;
        let path = dir.join(format!("{}{}", name, OCCUPIED_SUFFIX));
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        tracing::info!(path = %path.display(), "Opened container");
        self.open = Some(OpenContainer {
            file: BufWriter::new(file),
            path,
            written: 0,
        });
        if let Err(e) = self.emit(|out| {
            out.write_all(&descriptor)?;
            Ok(())
        }) {
            tracing::error!(error = %e, "Failed to write first record");
            self.discard_open();
            return Err(e);
        }
        Ok(())
    }

    /// Drop a container whose first record never made it out.
    fn discard_open(&mut self) {
        if let Some(open) = self.open.take() {
            drop(open.file);
            if let Err(e) = fs::remove_file(&open.path) {
                tracing::error!(
                    path = %open.path.display(),
                    error = %e,
                    "Failed to remove container"
                );
            }
        }
    }

    /// The synthetic first record naming the container, ready to write.
    fn build_descriptor(&self, file_name: &str) -> Result<Vec<u8>> {
        let metadata = self.collect_metadata()?;
        let url = format!(
            "{}{}",
            String::from_utf8_lossy(ARC_MAGIC),
            file_name
                .strip_suffix(DOT_COMPRESSED_FILE_EXTENSION)
                .unwrap_or(file_name)
        );
        let preamble = descriptor_preamble(!metadata.is_empty());
        let length = (preamble.len() + metadata.len()) as u64;
        let line = format_header_line(
            &url,
            FIRST_RECORD_IP,
            &timestamp::now_fourteen_digit(),
            FIRST_RECORD_MIMETYPE,
            length,
        );
        validate_header_line(&line)?;

        let mut record = Vec::with_capacity(line.len() + length as usize + 1);
        record.extend_from_slice(line.as_bytes());
        record.extend_from_slice(preamble.as_bytes());
        record.extend_from_slice(&metadata);
        record.push(LINE_SEPARATOR);
        Ok(record)
    }

    fn collect_metadata(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for source in &self.settings.metadata {
            match source {
                MetadataSource::Text(text) => body.extend_from_slice(text.as_bytes()),
                MetadataSource::File(path) => {
                    File::open(path)?.read_to_end(&mut body)?;
                }
            }
        }
        Ok(body)
    }

    /// Close the current file if it reached the rotation threshold.
    /// The next append opens a fresh one.
    pub fn rotate_if_full(&mut self) -> Result<bool> {
        let full = match (&self.open, self.settings.max_size) {
            (Some(open), Some(max)) => open.written >= max,
            _ => false,
        };
        if full {
            tracing::info!(
                written = self.position(),
                max = ?self.settings.max_size,
                "Rotating container"
            );
            self.close()?;
        }
        Ok(full)
    }

    /// Flush, close and rename the current file to its final name.
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        let open = match self.open.take() {
            Some(open) => open,
            None => return Ok(None),
        };
        let file = open.file.into_inner().map_err(|e| ArcError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        let final_path = open
            .path
            .to_str()
            .and_then(|p| p.strip_suffix(OCCUPIED_SUFFIX))
            .map(PathBuf::from)
            .unwrap_or_else(|| open.path.clone());
        fs::rename(&open.path, &final_path)?;
        tracing::info!(
            path = %final_path.display(),
            bytes = open.written,
            "Closed container"
        );
        self.finished.push(final_path.clone());
        Ok(Some(final_path))
    }

    /// Close the current file and mark it `.invalid` for attention.
    pub fn invalidate(&mut self) -> Result<Option<PathBuf>> {
        let closed = match self.close()? {
            Some(path) => path,
            None => return Ok(None),
        };
        let mut invalid = closed.clone().into_os_string();
        invalid.push(INVALID_SUFFIX);
        let invalid = PathBuf::from(invalid);
        fs::rename(&closed, &invalid)?;
        if let Some(last) = self.finished.last_mut() {
            *last = invalid.clone();
        }
        tracing::warn!(path = %invalid.display(), "Invalidated container");
        Ok(Some(invalid))
    }

    /// Stem shared by a container and the files derived from it
    pub fn container_stem(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        strip_container_suffixes(&name).to_string()
    }
}

impl Drop for ArcWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "Failed to close container on drop");
        }
    }
}

impl std::fmt::Debug for ArcWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcWriter")
            .field("current_path", &self.current_path())
            .field("position", &self.position())
            .field("finished", &self.finished.len())
            .finish()
    }
}

/// Copy exactly `length` body bytes, checking the stream agrees.
fn copy_body<C: ContentStream + ?Sized>(
    out: &mut dyn Write,
    content: &mut C,
    length: u64,
) -> Result<()> {
    let copied = io::copy(&mut (&mut *content).take(length), out)?;
    if copied != length {
        return Err(ArcError::RecordLengthMismatch {
            expected: length,
            actual: copied,
        });
    }
    match content.remaining() {
        Some(left) if left > 0 => Err(ArcError::RecordLengthMismatch {
            expected: length,
            actual: length + left,
        }),
        _ => Ok(()),
    }
}

/// Counts bytes on their way to the flat file.
struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
