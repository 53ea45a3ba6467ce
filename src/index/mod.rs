//! Index Generator
//!
//! Derived, line-oriented indexes built by scanning a container once with
//! digesting on.
//!
//! ## Responsibilities
//! - SURT canonical form of record URLs
//! - Wide CDX files (`.wcdx.gz`) with HTTP header columns
//! - Classic CDX listings
//! - Batch indexing across containers on worker threads

mod batch;
mod cdx;
mod surt;
mod wcdx;

pub use batch::{index_all, BatchSummary};
pub use cdx::{cdx_legend, cdx_line, write_cdx, write_cdx_file};
pub use surt::surt_from_uri;
pub use wcdx::{
    index_container, wcdx_legend, wcdx_line, wcdx_path, IndexOutcome, WCDX_EXTENSION, WCDX_VERSION,
};
