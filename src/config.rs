//! Configuration for arcstore
//!
//! Centralized settings for writers, readers, the writer pool and the
//! index generator, each with sensible defaults and a builder.

use std::path::PathBuf;
use std::time::Duration;

/// Default rotation threshold (bytes)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000_000;

/// Default filename prefix
pub const DEFAULT_PREFIX: &str = "IAH";

// =============================================================================
// Writer Settings
// =============================================================================

/// One blob appended to the body of a container's first record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    /// Inline text, written as UTF-8
    Text(String),

    /// Contents of a file, read when the first record is generated
    File(PathBuf),
}

/// Settings shared by every container a writer (or pool of writers) creates
#[derive(Debug, Clone)]
pub struct WriterSettings {
    // -------------------------------------------------------------------------
    // Output Location
    // -------------------------------------------------------------------------
    /// Directories containers are written into, used round-robin
    pub dirs: Vec<PathBuf>,

    /// Filename prefix
    pub prefix: String,

    /// Optional filename suffix placed before the extension
    pub suffix: Option<String>,

    // -------------------------------------------------------------------------
    // Container Shape
    // -------------------------------------------------------------------------
    /// Write each record as its own gzip member
    pub compress: bool,

    /// Rotate once the active file grows past this many bytes (None = never)
    pub max_size: Option<u64>,

    /// Blobs concatenated into the first record's body (makes version 1.1)
    pub metadata: Vec<MetadataSource>,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from("./arcs")],
            prefix: DEFAULT_PREFIX.to_string(),
            suffix: None,
            compress: true,
            max_size: Some(DEFAULT_MAX_FILE_SIZE),
            metadata: Vec::new(),
        }
    }
}

impl WriterSettings {
    /// Create a new settings builder
    pub fn builder() -> WriterSettingsBuilder {
        WriterSettingsBuilder::default()
    }
}

/// Builder for WriterSettings
#[derive(Default)]
pub struct WriterSettingsBuilder {
    settings: WriterSettings,
}

impl WriterSettingsBuilder {
    /// Replace the output directories with a single directory
    pub fn dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.dirs = vec![path.into()];
        self
    }

    /// Set the output directories (rotated round-robin)
    pub fn dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.settings.dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the filename prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.prefix = prefix.into();
        self
    }

    /// Set the filename suffix
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.settings.suffix = Some(suffix.into());
        self
    }

    /// Enable or disable per-record gzip compression
    pub fn compress(mut self, compress: bool) -> Self {
        self.settings.compress = compress;
        self
    }

    /// Set the rotation threshold in bytes
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.settings.max_size = Some(bytes);
        self
    }

    /// Never rotate
    pub fn unbounded(mut self) -> Self {
        self.settings.max_size = None;
        self
    }

    /// Add an inline metadata blob to the first record
    pub fn metadata_text(mut self, text: impl Into<String>) -> Self {
        self.settings.metadata.push(MetadataSource::Text(text.into()));
        self
    }

    /// Add a file whose contents go into the first record
    pub fn metadata_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.metadata.push(MetadataSource::File(path.into()));
        self
    }

    pub fn build(self) -> WriterSettings {
        self.settings
    }
}

// =============================================================================
// Reader Options
// =============================================================================

/// Parsing posture of a container reader
#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    /// Reject any header anomaly instead of repairing it
    pub strict: bool,

    /// Compute a SHA-1 digest over each record's payload
    pub digest: bool,

    /// Split the HTTP status line and headers off http(s) bodies
    pub parse_http_headers: bool,

    /// Sniff compression from content alone, ignoring the filename
    pub skip_suffix_check: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            digest: true,
            parse_http_headers: true,
            skip_suffix_check: true,
        }
    }
}

impl ReaderOptions {
    /// Options with strict parsing enabled
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn with_digest(mut self, digest: bool) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_http_headers(mut self, parse: bool) -> Self {
        self.parse_http_headers = parse;
        self
    }

    pub fn with_suffix_check(mut self, check: bool) -> Self {
        self.skip_suffix_check = !check;
        self
    }
}

// =============================================================================
// Pool Configuration
// =============================================================================

/// Bounds of a writer pool
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum writers borrowed at once
    pub max_active: usize,

    /// How long a borrow may block before failing
    pub max_wait: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 1,
            max_wait: Duration::from_secs(5 * 60),
        }
    }
}

impl PoolConfig {
    pub fn new(max_active: usize, max_wait: Duration) -> Self {
        Self {
            max_active,
            max_wait,
        }
    }
}

// =============================================================================
// Index Options
// =============================================================================

/// Options for derived index generation
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Write index files here instead of next to each container
    pub output_dir: Option<PathBuf>,

    /// Worker threads for batch indexing (0 = one per container, capped at 4)
    pub threads: usize,
}
