//! Error types for ddipatch
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using DdiError
pub type Result<T> = std::result::Result<T, DdiError>;

/// Unified error type for ddipatch operations
#[derive(Debug, Error)]
pub enum DdiError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A transfer reached the end of a store or region.
    ///
    /// `transferred` bytes were still moved before the boundary was hit, so a
    /// caller can tell a short transfer from one that never started.
    #[error("End of range at offset {offset} ({transferred} bytes transferred)")]
    EndOfRange { offset: u64, transferred: usize },

    // -------------------------------------------------------------------------
    // Field Errors
    // -------------------------------------------------------------------------
    #[error("Content of {len} bytes exceeds field capacity of {capacity} bytes")]
    CapacityExceeded { len: u64, capacity: u64 },

    #[error("Not enough space: {required} bytes required, {available} available")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Key {0:?} not found")]
    KeyNotFound(String),

    #[error("Replacement of {required} bytes does not fit in existing span of {span} bytes")]
    SpanTooSmall { required: u64, span: u64 },

    // -------------------------------------------------------------------------
    // Locator Errors
    // -------------------------------------------------------------------------
    #[error("Partition table error: {0}")]
    Partition(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Executable image error: {0}")]
    Executable(String),

    // -------------------------------------------------------------------------
    // Report Errors
    // -------------------------------------------------------------------------
    #[error("Report error: {0}")]
    Report(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DdiError {
    /// Whether this error is the end-of-range boundary signal rather than a
    /// real failure.
    pub fn is_end_of_range(&self) -> bool {
        matches!(self, DdiError::EndOfRange { .. })
    }
}
