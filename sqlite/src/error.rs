//! Error types for the SQLite adapter and the migration engine.

use electerm_data_core::{CoreError, StoreError};
use thiserror::Error;

/// Errors raised by [`SqliteStore`](crate::SqliteStore) operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Stored row could not be turned back into a record, or vice versa.
    #[error("conversion error: {0}")]
    ConversionError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Insert of a record whose `_id` is already stored.
    #[error("duplicate _id '{0}'")]
    DuplicateId(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Terminal failures of a migration run.
///
/// Per-table failures are not errors: they are reported in the
/// [`MigrationReport`](crate::MigrationReport) and the run continues.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The linked SQLite cannot host the relational store.
    #[error("SQLite is not supported in this runtime: {0}")]
    UnsupportedRuntime(String),

    /// The relational store could not be opened or initialized.
    #[error("failed to open SQLite database: {0}")]
    Open(#[from] SqliteError),

    /// Tables were processed but the completion marker was not written.
    /// Re-running is safe.
    #[error("migration incomplete: {0}")]
    Incomplete(#[source] StoreError),
}
