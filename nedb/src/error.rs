//! Error types for NeDB datafile operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing NeDB datafiles.
#[derive(Debug, Error)]
pub enum NedbError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Too many lines of a datafile failed to parse.
    #[error("datafile '{}' is corrupt: {corrupt} of {total} lines unreadable", path.display())]
    Corrupt {
        path: PathBuf,
        corrupt: usize,
        total: usize,
    },

    /// Insert of a record whose `_id` is already present.
    #[error("duplicate _id: {0}")]
    DuplicateId(String),

    /// Malformed query, update, or record identifier.
    #[error(transparent)]
    Core(#[from] electerm_data_core::CoreError),
}

/// Convenience alias for results with [`NedbError`].
pub type Result<T> = std::result::Result<T, NedbError>;
