//! Error types for arcstore
//!
//! Provides a unified error type for all container operations.

use thiserror::Error;

/// Result type alias using ArcError
pub type Result<T> = std::result::Result<T, ArcError>;

/// Unified error type for arcstore operations
#[derive(Debug, Error)]
pub enum ArcError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Malformed record header at offset {offset}: {reason}")]
    MalformedHeader { offset: u64, reason: String },

    #[error("Truncated record at offset {offset}: {reason}")]
    Truncated { offset: u64, reason: String },

    #[error("Unsupported HTTP sub-header at offset {offset}: {line:?}")]
    UnsupportedSubHeader { offset: u64, line: String },

    #[error("Deleted record at offset {offset}: {line}")]
    DeletedRecord { offset: u64, line: String },

    // -------------------------------------------------------------------------
    // Container Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(String),

    #[error("Record length mismatch: declared {expected}, copied {actual}")]
    RecordLengthMismatch { expected: u64, actual: u64 },

    #[error("Invalid header line: {0}")]
    InvalidHeaderLine(String),

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    #[error("Writer pool exhausted after {waited_ms}ms (active {active} of max {max_active})")]
    PoolExhausted {
        waited_ms: u64,
        active: usize,
        max_active: usize,
    },

    // -------------------------------------------------------------------------
    // Configuration / Transport Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ArcError {
    /// True for record-local failures a lenient reader can step over.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ArcError::DeletedRecord { .. }
                | ArcError::MalformedHeader { .. }
                | ArcError::UnsupportedSubHeader { .. }
        )
    }

    /// Attach a record offset to an I/O failure that surfaced mid-record.
    pub(crate) fn at_offset(self, offset: u64) -> Self {
        match self {
            ArcError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                ArcError::Truncated {
                    offset,
                    reason: e.to_string(),
                }
            }
            other => other,
        }
    }
}
