//! Content streams
//!
//! What a producer hands the writer for a record body. Streams that know
//! how much they still hold report it, so the writer can catch a declared
//! length that is shorter than the content.

use std::fs::File;
use std::io::{self, Cursor, Read};

/// A record body source
pub trait ContentStream: Read {
    /// Bytes left, when the stream can tell
    fn remaining(&self) -> Option<u64> {
        None
    }
}

impl ContentStream for &[u8] {
    fn remaining(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl<T: AsRef<[u8]>> ContentStream for Cursor<T> {
    fn remaining(&self) -> Option<u64> {
        let len = self.get_ref().as_ref().len() as u64;
        Some(len.saturating_sub(self.position()))
    }
}

impl ContentStream for File {}

impl<C: ContentStream + ?Sized> ContentStream for &mut C {
    fn remaining(&self) -> Option<u64> {
        (**self).remaining()
    }
}

impl<C: ContentStream + ?Sized> ContentStream for Box<C> {
    fn remaining(&self) -> Option<u64> {
        (**self).remaining()
    }
}

/// A recorded response of known size, replayed into the writer.
///
/// Wraps any reader together with the number of bytes it was recorded to
/// hold and counts them down as they are read.
#[derive(Debug)]
pub struct ReplayContent<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ReplayContent<R> {
    pub fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ReplayContent<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.remaining = self.remaining.saturating_sub(n as u64);
        Ok(n)
    }
}

impl<R: Read> ContentStream for ReplayContent<R> {
    fn remaining(&self) -> Option<u64> {
        Some(self.remaining)
    }
}
