//! Container file naming
//!
//! `<prefix>-<yyyyMMddHHmmss>-<serial>[-<suffix>].arc[.gz]`, carrying
//! `.open` while being written. Serial numbers and the directory
//! round-robin are shared by every writer built from one namer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::config::WriterSettings;
use crate::error::{ArcError, Result};
use crate::format::{ARC_FILE_EXTENSION, COMPRESSED_ARC_FILE_EXTENSION};

/// Hands out serial numbers and output directories
#[derive(Debug, Default)]
pub struct FileNamer {
    serial: AtomicU32,
    next_dir: AtomicUsize,
}

impl FileNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `serial` instead of zero
    pub fn starting_at(serial: u32) -> Self {
        Self {
            serial: AtomicU32::new(serial),
            next_dir: AtomicUsize::new(0),
        }
    }

    pub fn next_serial(&self) -> u32 {
        self.serial.fetch_add(1, Ordering::SeqCst)
    }

    /// Final file name (no in-progress suffix) for a new container
    pub fn file_name(settings: &WriterSettings, timestamp: &str, serial: u32) -> String {
        let extension = if settings.compress {
            COMPRESSED_ARC_FILE_EXTENSION
        } else {
            ARC_FILE_EXTENSION
        };
        match &settings.suffix {
            Some(suffix) if !suffix.is_empty() => format!(
                "{}-{}-{:05}-{}.{}",
                settings.prefix, timestamp, serial, suffix, extension
            ),
            _ => format!("{}-{}-{:05}.{}", settings.prefix, timestamp, serial, extension),
        }
    }

    /// Pick the next usable output directory, round-robin.
    ///
    /// Directories are created on demand. One that cannot be created or is
    /// read-only is skipped with a warning.
    pub fn next_dir(&self, settings: &WriterSettings) -> Result<PathBuf> {
        let count = settings.dirs.len();
        if count == 0 {
            return Err(ArcError::Config("no output directories configured".to_string()));
        }
        let start = self.next_dir.fetch_add(1, Ordering::SeqCst);
        for i in 0..count {
            let dir = &settings.dirs[(start + i) % count];
            match usable(dir) {
                Ok(()) => return Ok(dir.clone()),
                Err(e) => {
                    tracing::warn!(
                        dir = %dir.display(),
                        error = %e,
                        "Skipping unusable output directory"
                    )
                }
            }
        }
        Err(ArcError::Config(format!(
            "none of {} output directories is usable",
            count
        )))
    }
}

fn usable(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    if fs::metadata(dir)?.permissions().readonly() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "directory is read-only",
        ));
    }
    Ok(())
}
