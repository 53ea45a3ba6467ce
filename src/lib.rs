//! # arcstore
//!
//! Append-only ARC web archive containers:
//! - Lenient and strict readers over flat or per-record gzip containers
//! - Offset-based random access, local, in-memory or remote
//! - Rotating writers with the `LX` compressed-frame signature
//! - A bounded writer pool for concurrent producers
//! - Derived CDX / wide CDX index generation
//!
//! ## Architecture Overview
//!
//! ```text
//!   fetch pipeline                         indexers / replay
//!        │ (url, meta, content)                  ▲ (header, body, digest)
//!        ▼                                       │
//! ┌──────────────┐                        ┌──────┴───────┐
//! │ Writer Pool  │                        │    Index     │
//! │ (borrow/ret) │                        │  Generator   │
//! └──────┬───────┘                        └──────▲───────┘
//!        ▼                                       │
//! ┌──────────────┐   container files      ┌──────┴───────┐
//! │  ArcWriter   │ ─────────────────────► │  ArcReader   │
//! │ (rotation)   │   .arc / .arc.gz       │ (flat│gzip)  │
//! └──────┬───────┘                        └──────▲───────┘
//!        │                                       │
//!        └───────────►  Record Codec  ◄──────────┘
//!                    (header, HTTP, digest)
//!                            │
//!                       Format Model
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod format;
pub mod timestamp;

pub mod index;
pub mod pool;
pub mod reader;
pub mod record;
pub mod writer;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{IndexOptions, MetadataSource, PoolConfig, ReaderOptions, WriterSettings};
pub use error::{ArcError, Result};
pub use pool::{PooledWriter, WriterPool};
pub use reader::{ArcReader, ReadRecord, Record, ValidationReport};
pub use record::{HttpHeader, RecordFlag, RecordHeader};
pub use writer::{ArcWriter, ContentStream, RecordMeta, ReplayContent};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of arcstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
