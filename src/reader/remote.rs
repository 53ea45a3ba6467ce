//! Remote containers
//!
//! Fetching is delegated to a [`Transport`]. The reader only needs a byte
//! stream, optionally starting at a requested offset, and wraps it so that
//! forward seeks become skips.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::{ArcError, Result};

/// Source of remote container bytes
pub trait Transport: Send + Sync {
    /// Open `location`. When `start` is given the stream must begin at that
    /// byte offset of the object (a ranged request).
    fn open(&self, location: &str, start: Option<u64>) -> Result<Box<dyn Read + Send>>;
}

/// Transport over the local filesystem, for `file://` locations and plain
/// paths. Useful wherever containers are mounted rather than served.
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    root: Option<PathBuf>,
}

impl FileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative locations under `root`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = location.strip_prefix("file://").unwrap_or(location);
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

impl Transport for FileTransport {
    fn open(&self, location: &str, start: Option<u64>) -> Result<Box<dyn Read + Send>> {
        let path = self.resolve(location);
        let mut file = File::open(&path)
            .map_err(|e| ArcError::Transport(format!("{}: {}", path.display(), e)))?;
        if let Some(start) = start {
            file.seek(SeekFrom::Start(start))?;
        }
        Ok(Box::new(file))
    }
}

/// Last path segment of a location, query and fragment removed.
pub fn location_name(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let path = &location[..end];
    path.rsplit('/').next().unwrap_or(path)
}

/// A one-way stream made seekable in the forward direction only.
pub(crate) struct ForwardOnly {
    inner: Box<dyn Read + Send>,
    pos: u64,
}

impl ForwardOnly {
    pub(crate) fn new(inner: Box<dyn Read + Send>, start: u64) -> Self {
        Self { inner, pos: start }
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.pos += skipped;
        Ok(self.pos)
    }
}

impl Read for ForwardOnly {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ForwardOnly {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(target) if target >= self.pos => self.skip(target - self.pos),
            SeekFrom::Current(delta) if delta >= 0 => self.skip(delta as u64),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote stream cannot seek backwards",
            )),
        }
    }
}
